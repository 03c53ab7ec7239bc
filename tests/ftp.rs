//! FTP backend against a scripted in-process server.
//!
//! The server keeps a small in-memory tree and answers with vsftpd's reply
//! texts, including its generic "operation failed" 550s.

use std::collections::BTreeMap;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{tcp::OwnedWriteHalf, TcpListener},
};
use unifs::{Error, FileSystem, FtpFileSystem};

enum Node {
    Dir,
    File(Vec<u8>),
}

struct Tree {
    nodes: BTreeMap<String, Node>,
    cwd: String,
}

fn parent(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

impl Tree {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_owned(), Node::Dir);
        nodes.insert("/sub".to_owned(), Node::Dir);
        nodes.insert("/a.txt".to_owned(), Node::File(b"abc".to_vec()));
        Self {
            nodes,
            cwd: "/".to_owned(),
        }
    }

    fn resolve(&self, arg: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !arg.starts_with('/') {
            parts.extend(self.cwd.split('/').filter(|p| !p.is_empty()));
        }
        for part in arg.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    let _ = parts.pop();
                }
                part => parts.push(part),
            }
        }
        format!("/{}", parts.join("/"))
    }

    fn is_dir(&self, path: &str) -> bool {
        matches!(self.nodes.get(path), Some(Node::Dir))
    }

    fn children(&self, dir: &str) -> Vec<&str> {
        self.nodes
            .keys()
            .filter(|key| key.as_str() != "/" && parent(key) == dir)
            .map(String::as_str)
            .collect()
    }

    fn listing(&self, dir: &str) -> String {
        let mut out = String::from("total 8\r\n");
        for child in self.children(dir) {
            let name = child.rsplit('/').next().unwrap_or(child);
            let line = match &self.nodes[child] {
                Node::Dir => format!("drwxr-xr-x    2 ftp      ftp          4096 Mar 03 10:15 {name}"),
                Node::File(data) => format!(
                    "-rw-r--r--    1 ftp      ftp      {:>8} Mar 03 10:15 {name}",
                    data.len()
                ),
            };
            out.push_str(&line);
            out.push_str("\r\n");
        }
        out
    }

    fn rename(&mut self, from: &str, to: &str) {
        let moved: Vec<String> = self
            .nodes
            .keys()
            .filter(|key| key.as_str() == from || key.starts_with(&format!("{from}/")))
            .cloned()
            .collect();
        for key in moved {
            let node = self.nodes.remove(&key).unwrap();
            let _ = self.nodes.insert(format!("{to}{}", &key[from.len()..]), node);
        }
    }
}

async fn reply(wr: &mut OwnedWriteHalf, line: &str) {
    wr.write_all(format!("{line}\r\n").as_bytes()).await.unwrap();
}

/// Answers one control connection.
async fn serve(listener: TcpListener, accept_login: bool) {
    let (socket, _) = listener.accept().await.unwrap();
    let (rd, mut wr) = socket.into_split();
    let mut lines = BufReader::new(rd).lines();
    let mut tree = Tree::new();
    // failed transfers leave the listener in place, the client connects anyway
    let mut data: Option<TcpListener> = None;
    let mut rename_from: Option<String> = None;

    reply(&mut wr, "220 test server ready").await;

    while let Some(line) = lines.next_line().await.unwrap() {
        let (cmd, arg) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        let path = tree.resolve(arg);
        match cmd {
            "USER" => reply(&mut wr, "331 Please specify the password.").await,
            "PASS" if accept_login => reply(&mut wr, "230 Login successful.").await,
            "PASS" => {
                reply(&mut wr, "530 Login incorrect.").await;
                return;
            }
            "TYPE" => reply(&mut wr, "200 Switching to Binary mode.").await,
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let port = listener.local_addr().unwrap().port();
                let line = format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{})",
                    port >> 8,
                    port & 0xff
                );
                reply(&mut wr, &line).await;
                data = Some(listener);
            }
            "PWD" => reply(&mut wr, &format!("257 \"{}\" is the current directory", tree.cwd)).await,
            "CWD" if tree.is_dir(&path) => {
                tree.cwd = path;
                reply(&mut wr, "250 Directory successfully changed.").await;
            }
            "CWD" => reply(&mut wr, "550 Failed to change directory.").await,
            "LIST" => {
                let dir = if arg.is_empty() { tree.cwd.clone() } else { path };
                if !tree.is_dir(&dir) {
                    reply(&mut wr, "550 Failed to open directory.").await;
                    continue;
                }
                reply(&mut wr, "150 Here comes the directory listing.").await;
                let (mut conn, _) = data.take().unwrap().accept().await.unwrap();
                conn.write_all(tree.listing(&dir).as_bytes()).await.unwrap();
                conn.shutdown().await.unwrap();
                reply(&mut wr, "226 Directory send OK.").await;
            }
            "RETR" => {
                let Some(Node::File(content)) = tree.nodes.get(&path) else {
                    reply(&mut wr, "550 Failed to open file.").await;
                    continue;
                };
                reply(&mut wr, "150 Opening BINARY mode data connection.").await;
                let (mut conn, _) = data.take().unwrap().accept().await.unwrap();
                conn.write_all(content).await.unwrap();
                conn.shutdown().await.unwrap();
                reply(&mut wr, "226 Transfer complete.").await;
            }
            "STOR" => {
                if !tree.is_dir(parent(&path)) {
                    reply(&mut wr, "553 Could not create file.").await;
                    continue;
                }
                reply(&mut wr, "150 Ok to send data.").await;
                let (mut conn, _) = data.take().unwrap().accept().await.unwrap();
                let mut received = Vec::new();
                conn.read_to_end(&mut received).await.unwrap();
                let _ = tree.nodes.insert(path, Node::File(received));
                reply(&mut wr, "226 Transfer complete.").await;
            }
            "DELE" if matches!(tree.nodes.get(&path), Some(Node::File(_))) => {
                let _ = tree.nodes.remove(&path);
                reply(&mut wr, "250 Delete operation successful.").await;
            }
            "DELE" => reply(&mut wr, "550 Delete operation failed.").await,
            "MKD" if !tree.nodes.contains_key(&path) && tree.is_dir(parent(&path)) => {
                let line = format!("257 \"{path}\" created");
                let _ = tree.nodes.insert(path, Node::Dir);
                reply(&mut wr, &line).await;
            }
            "MKD" => reply(&mut wr, "550 Create directory operation failed.").await,
            "RMD" if tree.is_dir(&path) && path != "/" && tree.children(&path).is_empty() => {
                let _ = tree.nodes.remove(&path);
                reply(&mut wr, "250 Remove directory operation successful.").await;
            }
            "RMD" => reply(&mut wr, "550 Remove directory operation failed.").await,
            "RNFR" if tree.nodes.contains_key(&path) => {
                rename_from = Some(path);
                reply(&mut wr, "350 Ready for RNTO.").await;
            }
            "RNFR" => reply(&mut wr, "550 RNFR command failed.").await,
            "RNTO" => match rename_from.take() {
                Some(from) if tree.is_dir(parent(&path)) => {
                    tree.rename(&from, &path);
                    reply(&mut wr, "250 Rename successful.").await;
                }
                _ => reply(&mut wr, "550 Rename failed.").await,
            },
            "QUIT" => {
                reply(&mut wr, "221 Goodbye.").await;
                return;
            }
            _ => reply(&mut wr, "502 Command not implemented.").await,
        }
    }
}

async fn start(accept_login: bool) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(tokio::spawn(serve(listener, accept_login)));
    port
}

async fn connect() -> FtpFileSystem {
    let _ = env_logger::builder().is_test(true).try_init();
    let port = start(true).await;
    FtpFileSystem::create("127.0.0.1", port, "anonymous", "guest")
        .await
        .unwrap()
}

async fn read_all(mut stream: impl AsyncRead + Unpin) -> Vec<u8> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    buf
}

async fn names(fs: &FtpFileSystem, path: &str) -> Vec<String> {
    fs.list(path)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name().to_owned())
        .collect()
}

#[tokio::test]
async fn list_parses_entries() {
    let fs = connect().await;

    let entries = fs.list("/").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name(), "a.txt");
    assert_eq!(entries[0].size(), Some(3));
    assert!(!entries[0].is_dir());
    assert_eq!(entries[1].name(), "sub");
    assert!(entries[1].is_dir());

    assert!(fs.list("/nope").await.unwrap_err().is_not_found());

    fs.close().await.unwrap();
    // closing twice is a no-op
    fs.close().await.unwrap();
    assert!(fs.list("/").await.unwrap_err().is_connection());
    assert!(fs.get("/a.txt").await.err().unwrap().is_connection());
}

#[tokio::test]
async fn transfers_and_errors() {
    let fs = connect().await;

    fs.put(Box::pin(&b"uploaded"[..]), "/up.bin").await.unwrap();
    assert_eq!(read_all(fs.get("/up.bin").await.unwrap()).await, b"uploaded");
    assert_eq!(read_all(fs.get("/a.txt").await.unwrap()).await, b"abc");
    assert!(fs.get("/missing").await.err().unwrap().is_not_found());

    fs.delete("/up.bin").await.unwrap();
    assert!(matches!(fs.delete("/up.bin").await, Err(Error::NotFound(_))));

    fs.close().await.unwrap();
}

#[tokio::test]
async fn dropped_download_releases_the_connection() {
    let fs = connect().await;

    let unread = fs.get("/a.txt").await.unwrap();
    drop(unread);

    // the next command waits until the transfer reply was consumed
    assert_eq!(names(&fs, "/").await, vec!["a.txt", "sub"]);
    assert_eq!(read_all(fs.get("/a.txt").await.unwrap()).await, b"abc");

    fs.close().await.unwrap();
}

#[tokio::test]
async fn mkdir_with_generic_failure_reply() {
    let fs = connect().await;

    fs.mkdir("/fresh", false).await.unwrap();
    assert!(matches!(
        fs.mkdir("/fresh", false).await,
        Err(Error::AlreadyExists(_))
    ));
    assert!(matches!(
        fs.mkdir("/a.txt", false).await,
        Err(Error::AlreadyExists(_))
    ));
    assert!(fs.mkdir("/no/parent", false).await.unwrap_err().is_not_found());

    // the lookups leave the working directory alone
    assert_eq!(names(&fs, ".").await, vec!["a.txt", "fresh", "sub"]);
}

#[tokio::test]
async fn mkdir_recursive_is_idempotent() {
    let fs = connect().await;

    fs.mkdir("/x/y/z", true).await.unwrap();
    fs.mkdir("/x/y/z", true).await.unwrap();
    fs.mkdir("/sub/inner", true).await.unwrap();

    assert_eq!(names(&fs, "/x/y").await, vec!["z"]);
    assert!(fs.list("/x/y").await.unwrap()[0].is_dir());
    assert_eq!(names(&fs, "/sub").await, vec!["inner"]);
    assert_eq!(names(&fs, ".").await, vec!["a.txt", "sub", "x"]);

    assert!(matches!(
        fs.mkdir("/a.txt/below", true).await,
        Err(Error::AlreadyExists(_))
    ));
}

#[tokio::test]
async fn rmdir_with_generic_failure_reply() {
    let fs = connect().await;

    fs.mkdir("/t/inner", true).await.unwrap();
    fs.put(Box::pin(&b"1"[..]), "/t/file.txt").await.unwrap();
    fs.put(Box::pin(&b"22"[..]), "/t/inner/deep.txt").await.unwrap();

    assert!(matches!(fs.rmdir("/t", false).await, Err(Error::NotEmpty(_))));
    assert!(fs.rmdir("/gone", false).await.unwrap_err().is_not_found());
    assert!(fs.rmdir("/no/such", false).await.unwrap_err().is_not_found());
    assert!(matches!(
        fs.rmdir("/a.txt", false).await,
        Err(Error::Backend { .. })
    ));

    fs.rmdir("/t", true).await.unwrap();
    assert_eq!(names(&fs, "/").await, vec!["a.txt", "sub"]);
    assert!(fs.rmdir("/t", false).await.unwrap_err().is_not_found());

    fs.rmdir("/sub", false).await.unwrap();
    assert_eq!(names(&fs, "/").await, vec!["a.txt"]);
}

#[tokio::test]
async fn rename_moves_entries() {
    let fs = connect().await;

    fs.rename("/a.txt", "/sub/b.txt").await.unwrap();
    assert_eq!(names(&fs, "/").await, vec!["sub"]);
    assert_eq!(read_all(fs.get("/sub/b.txt").await.unwrap()).await, b"abc");

    fs.rename("/sub", "/renamed").await.unwrap();
    assert_eq!(names(&fs, "/renamed").await, vec!["b.txt"]);

    assert!(fs.rename("/a.txt", "/c.txt").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn rejected_login() {
    let port = start(false).await;
    let result = FtpFileSystem::create("127.0.0.1", port, "anonymous", "wrong").await;
    assert!(matches!(result, Err(Error::Connection(_))));
}

#[tokio::test]
async fn unreachable_server() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let result = FtpFileSystem::create("127.0.0.1", port, "anonymous", "guest").await;
    assert!(matches!(result, Err(Error::Connection(_))));
}
