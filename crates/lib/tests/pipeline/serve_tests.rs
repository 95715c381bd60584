use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use spabuild_lib::emit::write::BuildManifest;
use spabuild_lib::serve::{DevServer, ServeError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::common::{Project, TEMPLATE, single_entry};

struct Running {
  addr: SocketAddr,
  stop: oneshot::Sender<()>,
  handle: JoinHandle<Result<(), ServeError>>,
}

impl Running {
  fn url(&self, path: &str) -> String {
    format!("http://{}{}", self.addr, path)
  }

  async fn stop(self) {
    let _ = self.stop.send(());
    self.handle.await.unwrap().unwrap();
  }
}

fn serve_config(project: &Project, backend: &str) -> String {
  project.write("src/index.css", ".app { color: red; }\n");
  project.write("src/index.js", "console.log('app');\n");
  format!(
    "{}\n[serve]\nhost = \"127.0.0.1\"\nport = 0\nwatch = false\nproxy = [{{ prefix = \"/api\", target = \"{}\" }}]\n",
    single_entry(&["./index.css", "./index.js"]),
    backend
  )
}

/// Start a server and wait for its first build to land.
async fn start(project: &Project, backend: &str) -> Running {
  let resolved = project.config(&serve_config(project, backend));
  let server = DevServer::bind(Arc::new(resolved), false).await.unwrap();
  let addr = server.local_addr().unwrap();
  let app = server.app_state();
  let (stop, stopped) = oneshot::channel();
  let handle = tokio::spawn(server.run(async move {
    let _ = stopped.await;
  }));

  for _ in 0..200 {
    if app.has_document().await {
      break;
    }
    tokio::time::sleep(Duration::from_millis(25)).await;
  }
  assert!(app.has_document().await, "initial build did not finish");
  Running { addr, stop, handle }
}

/// A local address nothing listens on.
fn closed_backend() -> String {
  let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  let addr = listener.local_addr().unwrap();
  drop(listener);
  format!("http://{}", addr)
}

#[tokio::test]
async fn api_requests_are_proxied_unmodified() {
  let mut backend = mockito::Server::new_async().await;
  let mock = backend
    .mock("POST", "/api/widgets")
    .match_query(mockito::Matcher::UrlEncoded("page".into(), "2".into()))
    .match_body("{\"name\":\"gear\"}")
    .with_status(201)
    .with_header("x-backend", "yes")
    .with_body("[{\"id\":1}]")
    .create_async()
    .await;

  let project = Project::new();
  let server = start(&project, &backend.url()).await;

  let response = reqwest::Client::new()
    .post(server.url("/api/widgets?page=2"))
    .body("{\"name\":\"gear\"}")
    .send()
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::CREATED);
  assert_eq!(response.headers()["x-backend"], "yes");
  assert_eq!(response.text().await.unwrap(), "[{\"id\":1}]");
  mock.assert_async().await;

  server.stop().await;
}

#[tokio::test]
async fn unreachable_backend_is_a_bad_gateway() {
  let project = Project::new();
  let server = start(&project, &closed_backend()).await;

  let response = reqwest::get(server.url("/api/widgets")).await.unwrap();
  assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
  assert!(response.text().await.unwrap().starts_with("proxy error:"));

  server.stop().await;
}

#[tokio::test]
async fn client_routes_fall_back_to_the_document() {
  let project = Project::new();
  let server = start(&project, &closed_backend()).await;

  let response = reqwest::get(server.url("/some/client/route")).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert!(
    response.headers()["content-type"]
      .to_str()
      .unwrap()
      .starts_with("text/html")
  );
  let body = response.text().await.unwrap();
  assert!(body.contains("<div id=\"root\"></div>"));
  assert!(body.contains("<script defer src=\"/scripts/main."));
  assert_ne!(body, TEMPLATE);

  let response = reqwest::Client::new()
    .post(server.url("/some/client/route"))
    .send()
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::NOT_FOUND);
  assert_eq!(response.text().await.unwrap(), "not found");

  server.stop().await;
}

#[tokio::test]
async fn built_styles_are_served_as_css() {
  let project = Project::new();
  let server = start(&project, &closed_backend()).await;

  let manifest = BuildManifest::load(&project.output()).unwrap().unwrap();
  let style = manifest.entries["main"]
    .iter()
    .find(|name| name.starts_with("styles/"))
    .unwrap()
    .clone();

  let response = reqwest::get(server.url(&format!("/{}", style))).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(response.headers()["content-type"], "text/css");
  assert_eq!(response.text().await.unwrap(), project.read_output(&style));

  server.stop().await;
}

#[tokio::test]
async fn public_files_are_served() {
  let project = Project::new();
  project.write("../public/robots.txt", "User-agent: *\n");
  let server = start(&project, &closed_backend()).await;

  let response = reqwest::get(server.url("/robots.txt")).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(response.text().await.unwrap(), "User-agent: *\n");

  server.stop().await;
}

#[tokio::test]
async fn occupied_port_is_a_bind_error() {
  let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  let port = occupied.local_addr().unwrap().port();

  let project = Project::new();
  let toml = serve_config(&project, "http://127.0.0.1:9").replace("port = 0", &format!("port = {}", port));
  let resolved = project.config(&toml);

  let err = DevServer::bind(Arc::new(resolved), false).await.err().unwrap();
  match err {
    ServeError::Bind { addr, .. } => assert_eq!(addr, format!("127.0.0.1:{}", port)),
    other => panic!("unexpected error: {other}"),
  }
}
