#![allow(dead_code)]

pub mod site {
    use std::path::{Path, PathBuf};

    use trellis::config::Config;

    /// A disposable dist directory shaped like real build output: a
    /// manifest, compiled view modules, and the framework fallbacks.
    pub struct TestSite {
        dir: tempfile::TempDir,
        pub config: Config,
    }

    impl TestSite {
        pub fn new(manifest: &serde_json::Value) -> Self {
            let dir = tempfile::tempdir().expect("create temp site");
            let mut config = Config::default();
            config.dir.root = dir.path().to_path_buf();

            std::fs::create_dir_all(config.views_dir()).unwrap();
            std::fs::create_dir_all(config.static_root()).unwrap();
            std::fs::write(
                config.manifest_path(),
                serde_json::to_string_pretty(manifest).unwrap(),
            )
            .unwrap();
            trellis::pages::ensure_fallback_views(&config.views_dir()).unwrap();

            Self { dir, config }
        }

        pub fn dev(mut self) -> Self {
            self.config.dev = true;
            self
        }

        pub fn root(&self) -> &Path {
            self.dir.path()
        }

        /// Write one compiled page module.
        pub fn write_view(&self, name: &str, module: &serde_json::Value) -> PathBuf {
            let path = self.config.views_dir().join(format!("{name}.json"));
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, serde_json::to_string(module).unwrap()).unwrap();
            path
        }

        /// Replace the manifest file (what a rebuild does).
        pub fn write_manifest(&self, manifest: &serde_json::Value) {
            std::fs::write(
                self.config.manifest_path(),
                serde_json::to_string_pretty(manifest).unwrap(),
            )
            .unwrap();
        }

        /// Write a built client asset under the static directory.
        pub fn write_static(&self, rel: &str, content: &str) {
            let path = self.config.static_root().join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
    }
}

pub mod test_server {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::Once;
    use std::time::Duration;

    use trellis::server::{AppService, HttpServer, ServerHandle};

    /// Ensures May coroutines are configured only once.
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// Start a service on a random local port.
    pub fn start(service: AppService) -> (ServerHandle, SocketAddr) {
        setup_may_runtime();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let handle = HttpServer(service).start(addr).unwrap();
        handle.wait_ready().unwrap();
        (handle, addr)
    }

    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {:?}", e),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn request(addr: &SocketAddr, method: &str, path: &str) -> String {
        send_request(
            addr,
            &format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"),
        )
    }

    pub fn get(addr: &SocketAddr, path: &str) -> String {
        request(addr, "GET", path)
    }

    pub fn status_of(resp: &str) -> u16 {
        resp.lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0)
    }

    pub fn header_of(resp: &str, name: &str) -> Option<String> {
        let head = resp.split("\r\n\r\n").next()?;
        for line in head.lines().skip(1) {
            if let Some((key, value)) = line.split_once(':') {
                if key.trim().eq_ignore_ascii_case(name) {
                    return Some(value.trim().to_string());
                }
            }
        }
        None
    }

    pub fn body_of(resp: &str) -> String {
        resp.split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default()
    }
}
