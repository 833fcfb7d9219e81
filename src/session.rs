//! Authenticated SSH session to the import node and the processes run on it.

use ssh2::{Channel, DisconnectCode, Session};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use crate::config::Config;
use crate::error::ImportError;

/// Connection to the host named in [`Config`].
///
/// Any host key is accepted, nothing is checked against `known_hosts`.
pub struct RemoteSession<'a> {
    config: &'a Config,
    session: Option<Session>,
}

impl<'a> RemoteSession<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn connect(&mut self) -> Result<(), ImportError> {
        let host = &self.config.hostname;
        let addr = format!("{}:{}", host, self.config.port);
        let network_error = |reason: String| ImportError::Network {
            addr: addr.clone(),
            reason,
        };

        let socket = addr
            .to_socket_addrs()
            .map_err(|e| network_error(format!("failed to resolve address: {e}")))?
            .next()
            .ok_or_else(|| network_error("address resolved to nothing".into()))?;
        let tcp = TcpStream::connect(socket)
            .map_err(|e| network_error(format!("failed to connect TCP: {e}")))?;

        let mut sess = Session::new()
            .map_err(|e| network_error(format!("failed to create session: {e}")))?;
        sess.set_tcp_stream(tcp);
        sess.handshake()
            .map_err(|e| network_error(format!("SSH handshake failed: {e}")))?;

        let auth_error = |reason: String| ImportError::Authentication {
            host: host.clone(),
            user: self.config.username.clone(),
            reason,
        };
        sess.userauth_password(&self.config.username, &self.config.password)
            .map_err(|e| auth_error(e.to_string()))?;
        if !sess.authenticated() {
            return Err(auth_error("server did not accept the password".into()));
        }

        self.session = Some(sess);
        Ok(())
    }

    /// The authenticated transport, borrowed for file copies.
    pub fn transport(&self) -> Result<&Session, ImportError> {
        self.session
            .as_ref()
            .ok_or_else(|| ImportError::RemoteExecution("session is not connected".into()))
    }
}

/// A shell on the remote node that can start commands and be closed once.
pub trait RemoteShell {
    type Process: RemoteCommand;

    /// Start `command` in a fresh remote shell. Returns once the process is
    /// spawned; output is consumed through the returned handle.
    fn execute(&self, command: &str) -> Result<Self::Process, ImportError>;

    /// Disconnect. Consumes the shell so it cannot be closed twice.
    fn close(self) -> Result<(), ImportError>;
}

/// A command running on the remote node: its stdin, stdout and stderr, and
/// the exit status once it terminates.
pub trait RemoteCommand {
    fn stdin(&mut self) -> &mut dyn Write;

    fn stdout(&mut self) -> &mut dyn Read;

    fn stderr(&mut self) -> Box<dyn Read + '_>;

    /// Block until the command has terminated and return its status.
    fn wait(self) -> Result<i32, ImportError>;
}

impl RemoteShell for RemoteSession<'_> {
    type Process = RemoteProcess;

    fn execute(&self, command: &str) -> Result<RemoteProcess, ImportError> {
        let mut channel = self.transport()?.channel_session()?;
        channel.exec(command)?;
        Ok(RemoteProcess { channel })
    }

    fn close(self) -> Result<(), ImportError> {
        match self.session {
            Some(sess) => {
                sess.disconnect(Some(DisconnectCode::ByApplication), "import finished", None)?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

pub struct RemoteProcess {
    channel: Channel,
}

impl RemoteCommand for RemoteProcess {
    fn stdin(&mut self) -> &mut dyn Write {
        &mut self.channel
    }

    fn stdout(&mut self) -> &mut dyn Read {
        &mut self.channel
    }

    fn stderr(&mut self) -> Box<dyn Read + '_> {
        Box::new(self.channel.stderr())
    }

    fn wait(mut self) -> Result<i32, ImportError> {
        self.channel.wait_close()?;
        let status = self.channel.exit_status()?;
        let signal = self.channel.exit_signal()?.exit_signal;
        termination_status(status, signal)
    }
}

/// A command killed by a signal never sends `exit-status`, so libssh2
/// reports the channel's initial 0. The signal decides in that case.
pub fn termination_status(status: i32, signal: Option<String>) -> Result<i32, ImportError> {
    match signal {
        Some(sig) => Err(ImportError::RemoteExecution(format!(
            "remote command was killed by signal {sig}"
        ))),
        None => Ok(status),
    }
}

/// Line iterator over a remote stream. Invalid UTF-8 is replaced rather
/// than ending the stream.
pub struct Lines<R> {
    reader: R,
    buf: Vec<u8>,
}

pub fn remote_lines<R: Read>(reader: R) -> Lines<BufReader<R>> {
    Lines {
        reader: BufReader::new(reader),
        buf: Vec::new(),
    }
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.ends_with(b"\n") {
                    self.buf.pop();
                    if self.buf.ends_with(b"\r") {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
