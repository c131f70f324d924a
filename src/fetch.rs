//! One-time download of the manual.

use crate::error::Error;

use tempfile::NamedTempFile;

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

/// Connecting and every read of the body must finish within this time.
const TIMEOUT: Duration = Duration::from_secs(60);

/// Makes sure the manual is available at `path`, downloading it from `url` if
/// it isn't.
///
/// An existing file is never touched or re-validated. A download is written to
/// a temporary file next to `path` and only renamed into place once it is
/// complete, so `path` either doesn't exist or holds the whole document. The
/// temporary file is removed if anything fails.
pub fn acquire(url: &str, path: &Path) -> Result<(), Error> {
    if path.exists() {
        debug!("using cached manual at {}", path.display());
        return Ok(());
    }

    info!("downloading manual from {} to {}", url, path.display());
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(TIMEOUT)
        .timeout_read(TIMEOUT)
        .build();
    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            return Err(Error::fetch(url, format!("HTTP status {} {}", code, response.status_text())));
        }
        Err(e) => return Err(Error::fetch(url, e)),
    };
    if !(200..300).contains(&response.status()) {
        return Err(Error::fetch(url, format!("HTTP status {}", response.status())));
    }

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    let bytes = io::copy(&mut response.into_reader(), &mut tmp)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    info!("downloaded {} bytes", bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves a single HTTP response on a local port and returns its URL.
    fn serve_once(status: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            // consume the request head
            while reader.read_line(&mut line).unwrap() > 0 {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            ).unwrap();
            stream.write_all(body).unwrap();
        });
        format!("http://{}/x86manual.pdf", addr)
    }

    #[test]
    fn existing_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x86manual.pdf");
        fs::write(&path, b"cached").unwrap();

        // the URL is never contacted
        acquire("http://127.0.0.1:9/unused", &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"cached");
    }

    #[test]
    fn downloads_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x86manual.pdf");
        let url = serve_once("200 OK", b"%PDF-1.4 manual");

        acquire(&url, &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.4 manual");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn error_status_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x86manual.pdf");
        let url = serve_once("404 Not Found", b"");

        match acquire(&url, &path) {
            Err(Error::Fetch { reason, .. }) => assert!(reason.contains("404"), "{}", reason),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
