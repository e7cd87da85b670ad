//! In-process FTP server for tests
//!
//! Serves exactly one control session on 127.0.0.1 from a background thread,
//! speaking the subset of RFC 959 the client uses. Passive data channels
//! only. The remote tree is an in-memory map; the final tree and the command
//! log are handed back by `ScriptedServer::finish`.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub(crate) const USER: &str = "alice";
pub(crate) const PASSWORD: &str = "secret";

const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote directory tree with absolute, normalised paths as keys
#[derive(Debug, Clone)]
pub(crate) struct RemoteFs {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
    /// Files whose RETR opens the data channel and then sends nothing
    pub stalled: BTreeSet<String>,
}

impl RemoteFs {
    pub fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        RemoteFs {
            dirs,
            files: BTreeMap::new(),
            stalled: BTreeSet::new(),
        }
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.dirs.insert(path.to_string());
        self
    }

    pub fn with_file(mut self, path: &str, contents: &[u8]) -> Self {
        self.files.insert(path.to_string(), contents.to_vec());
        self
    }

    pub fn with_stalled_file(mut self, path: &str) -> Self {
        self.stalled.insert(path.to_string());
        self
    }

    fn names_in(&self, dir: &str) -> Vec<String> {
        let subdirs = self.dirs.iter().filter(|d| d.as_str() != "/");
        let files = self.files.keys();
        let mut names: Vec<String> = subdirs
            .chain(files)
            .filter(|p| parent_of(p) == dir)
            .map(|p| basename(p).to_string())
            .collect();
        names.sort();
        names
    }
}

/// What the server saw and how the tree looked when the session ended
#[derive(Debug)]
pub(crate) struct Session {
    pub commands: Vec<String>,
    pub fs: RemoteFs,
}

impl Session {
    pub fn count(&self, verb: &str) -> usize {
        self.commands
            .iter()
            .filter(|c| c.split(' ').next() == Some(verb))
            .count()
    }
}

pub(crate) struct ScriptedServer {
    addr: SocketAddr,
    handle: JoinHandle<Session>,
}

impl ScriptedServer {
    pub fn start(fs: RemoteFs) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (control, _) = listener.accept().unwrap();
            serve(control, fs)
        });
        ScriptedServer { addr, handle }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Waits for the session to end and returns it
    pub fn finish(self) -> Session {
        self.handle.join().unwrap()
    }
}

fn serve(control: TcpStream, mut fs: RemoteFs) -> Session {
    control.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
    let mut writer = control.try_clone().unwrap();
    let mut reader = BufReader::new(control);
    let mut commands = Vec::new();

    let mut cwd = "/".to_string();
    let mut user_ok = false;
    let mut passive: Option<TcpListener> = None;
    let mut rest: usize = 0;

    reply(&mut writer, "220 scripted ready");

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        commands.push(line.clone());
        let (verb, arg) = match line.split_once(' ') {
            Some((v, a)) => (v.to_ascii_uppercase(), a.to_string()),
            None => (line.to_ascii_uppercase(), String::new()),
        };

        match verb.as_str() {
            "USER" => {
                user_ok = arg == USER;
                reply(&mut writer, "331 password required");
            }
            "PASS" => {
                if user_ok && arg == PASSWORD {
                    reply(&mut writer, "230 logged in");
                } else {
                    reply(&mut writer, "530 login incorrect");
                }
            }
            "PWD" => reply(&mut writer, &format!("257 \"{}\" is the current directory", cwd)),
            "CWD" => {
                let target = resolve(&cwd, &arg);
                if fs.dirs.contains(&target) {
                    cwd = target;
                    reply(&mut writer, "250 directory changed");
                } else {
                    reply(&mut writer, "550 no such directory");
                }
            }
            "CDUP" => {
                if cwd == "/" {
                    reply(&mut writer, "550 no parent directory");
                } else {
                    cwd = parent_of(&cwd).to_string();
                    reply(&mut writer, "250 directory changed");
                }
            }
            "TYPE" => reply(&mut writer, "200 type set"),
            "NOOP" => reply(&mut writer, "200 ok"),
            "REST" => match arg.parse::<usize>() {
                Ok(offset) => {
                    rest = offset;
                    reply(&mut writer, &format!("350 restarting at {}", offset));
                }
                Err(_) => reply(&mut writer, "501 bad offset"),
            },
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                let port = listener.local_addr().unwrap().port();
                passive = Some(listener);
                reply(
                    &mut writer,
                    &format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{})",
                        port >> 8,
                        port & 0xff
                    ),
                );
            }
            "NLST" => {
                let dir = if arg.is_empty() {
                    cwd.clone()
                } else {
                    resolve(&cwd, &arg)
                };
                if !fs.dirs.contains(&dir) {
                    refuse_data(&mut passive);
                    reply(&mut writer, "550 no such directory");
                    continue;
                }
                let Some(mut data) = open_data(&mut passive) else {
                    reply(&mut writer, "425 use PASV first");
                    continue;
                };
                reply(&mut writer, "150 here comes the listing");
                for name in fs.names_in(&dir) {
                    data.write_all(format!("{}\r\n", name).as_bytes()).unwrap();
                }
                drop(data);
                reply(&mut writer, "226 listing sent");
            }
            "RETR" => {
                let path = resolve(&cwd, &arg);
                let Some(contents) = fs.files.get(&path).cloned() else {
                    refuse_data(&mut passive);
                    reply(&mut writer, "550 no such file");
                    continue;
                };
                let Some(mut data) = open_data(&mut passive) else {
                    reply(&mut writer, "425 use PASV first");
                    continue;
                };
                reply(&mut writer, "150 opening data connection");
                if fs.stalled.contains(&path) {
                    // Hold the channel open until the client gives up on it.
                    let _ = data.read(&mut [0u8; 1]);
                    rest = 0;
                    reply(&mut writer, "426 transfer aborted");
                    continue;
                }
                let start = rest.min(contents.len());
                data.write_all(&contents[start..]).unwrap();
                drop(data);
                rest = 0;
                reply(&mut writer, "226 transfer complete");
            }
            "STOR" => {
                let path = resolve(&cwd, &arg);
                if !fs.dirs.contains(parent_of(&path)) {
                    refuse_data(&mut passive);
                    reply(&mut writer, "553 no such directory");
                    continue;
                }
                let Some(mut data) = open_data(&mut passive) else {
                    reply(&mut writer, "425 use PASV first");
                    continue;
                };
                reply(&mut writer, "150 ok to send data");
                let mut received = Vec::new();
                data.read_to_end(&mut received).unwrap();
                let mut contents = fs.files.remove(&path).unwrap_or_default();
                contents.truncate(rest);
                contents.resize(rest, 0);
                contents.extend_from_slice(&received);
                fs.files.insert(path, contents);
                rest = 0;
                reply(&mut writer, "226 transfer complete");
            }
            "DELE" => {
                let path = resolve(&cwd, &arg);
                if fs.files.remove(&path).is_some() {
                    reply(&mut writer, "250 file deleted");
                } else {
                    reply(&mut writer, "550 no such file");
                }
            }
            "SITE" => {
                let mut parts = arg.splitn(3, ' ');
                let sub = parts.next().unwrap_or_default().to_ascii_uppercase();
                let mode = parts.next().unwrap_or_default();
                let target = resolve(&cwd, parts.next().unwrap_or_default());
                if sub != "CHMOD" {
                    reply(&mut writer, "500 unknown SITE command");
                } else if fs.files.contains_key(&target) {
                    reply(&mut writer, &format!("200 CHMOD {} applied", mode));
                } else {
                    reply(&mut writer, "550 no such file");
                }
            }
            "QUIT" => {
                reply(&mut writer, "221 goodbye");
                break;
            }
            _ => reply(&mut writer, "502 command not implemented"),
        }
    }

    Session { commands, fs }
}

fn reply(writer: &mut TcpStream, line: &str) {
    // The client may already have hung up; the command log still counts.
    let _ = writer.write_all(format!("{}\r\n", line).as_bytes());
}

/// Accepts and drops a pending data connection so the client is not left
/// connecting to a closed port before it reads the refusal.
fn refuse_data(passive: &mut Option<TcpListener>) {
    drop(open_data(passive));
}

fn open_data(passive: &mut Option<TcpListener>) -> Option<TcpStream> {
    let listener = passive.take()?;
    let (stream, _) = listener.accept().ok()?;
    stream.set_read_timeout(Some(IO_TIMEOUT)).ok()?;
    Some(stream)
}

fn resolve(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", cwd.trim_end_matches('/'), path)
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[test]
fn test_resolve_paths() {
    assert_eq!(resolve("/", "pub"), "/pub");
    assert_eq!(resolve("/pub", "../etc/./x"), "/etc/x");
    assert_eq!(resolve("/pub", "/abs"), "/abs");
    assert_eq!(resolve("/pub", "."), "/pub");
    assert_eq!(parent_of("/pub/a"), "/pub");
    assert_eq!(parent_of("/pub"), "/");
}
