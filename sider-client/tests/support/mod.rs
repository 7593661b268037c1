//! Scripted RESP server for integration tests.

#![allow(dead_code)]

use std::future::Future;

use anyhow::{anyhow, bail, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct MockServer {
    listener: TcpListener,
}

impl MockServer {
    pub async fn accept(&self) -> Result<Peer> {
        let (stream, _) = self.listener.accept().await?;
        let (reader, writer) = stream.into_split();
        Ok(Peer {
            reader: BufReader::new(reader),
            writer,
        })
    }
}

/// One accepted client connection.
pub struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Peer {
    /// Reads one command array; `None` once the client hung up.
    pub async fn read_command(&mut self) -> Result<Option<Vec<String>>> {
        let Some(line) = self.read_line().await? else {
            return Ok(None);
        };
        let count: usize = line
            .strip_prefix('*')
            .ok_or_else(|| anyhow!("expected array, got {line:?}"))?
            .parse()?;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            let line = self
                .read_line()
                .await?
                .ok_or_else(|| anyhow!("eof inside command"))?;
            let len: usize = line
                .strip_prefix('$')
                .ok_or_else(|| anyhow!("expected bulk, got {line:?}"))?
                .parse()?;
            let mut data = vec![0u8; len + 2];
            self.reader.read_exact(&mut data).await?;
            if !data.ends_with(b"\r\n") {
                bail!("missing crlf");
            }
            data.truncate(len);
            args.push(String::from_utf8(data)?);
        }
        Ok(Some(args))
    }

    /// Reads one command and checks it, ignoring the command name's case.
    pub async fn expect(&mut self, expected: &[&str]) -> Result<()> {
        let args = self
            .read_command()
            .await?
            .ok_or_else(|| anyhow!("client hung up, expected {expected:?}"))?;
        let matches = args.len() == expected.len()
            && args[0].eq_ignore_ascii_case(expected[0])
            && args[1..] == expected[1..];
        if !matches {
            bail!("expected {expected:?}, got {args:?}");
        }
        Ok(())
    }

    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        match line.strip_suffix("\r\n") {
            Some(stripped) => Ok(Some(stripped.to_owned())),
            None => bail!("invalid line {line:?}"),
        }
    }
}

/// Binds a local port and runs `script` against it.
///
/// Returns the `redis://` base URL (no db) and the script's handle.
pub async fn spawn_server<F, Fut>(script: F) -> Result<(String, JoinHandle<Result<()>>)>
where
    F: FnOnce(MockServer) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("redis://{}", listener.local_addr()?);
    let handle = tokio::spawn(script(MockServer { listener }));
    Ok((url, handle))
}

/// Serves every connection with canned replies until the test ends.
///
/// `PING` answers `+PONG`, `SET` answers `+OK`, `GET` answers the key,
/// `SUBSCRIBE` confirms each channel and stays silent afterwards.
pub async fn spawn_responder() -> Result<String> {
    let (url, _) = spawn_server(|server| async move {
        while let Ok(mut peer) = server.accept().await {
            tokio::spawn(async move {
                while let Ok(Some(args)) = peer.read_command().await {
                    let reply = canned_reply(&args);
                    if peer.send(&reply).await.is_err() {
                        break;
                    }
                }
            });
        }
        Ok::<(), anyhow::Error>(())
    })
    .await?;
    Ok(url)
}

fn canned_reply(args: &[String]) -> Vec<u8> {
    match args[0].to_ascii_lowercase().as_str() {
        "ping" => b"+PONG\r\n".to_vec(),
        "set" => b"+OK\r\n".to_vec(),
        "get" => bulk(&args[1]),
        "subscribe" => {
            let mut out = Vec::new();
            for (idx, channel) in args[1..].iter().enumerate() {
                out.extend_from_slice(b"*3\r\n");
                out.extend_from_slice(&bulk("subscribe"));
                out.extend_from_slice(&bulk(channel));
                out.extend_from_slice(format!(":{}\r\n", idx + 1).as_bytes());
            }
            out
        }
        other => format!("-ERR unknown command '{other}'\r\n").into_bytes(),
    }
}

pub fn bulk(data: &str) -> Vec<u8> {
    format!("${}\r\n{}\r\n", data.len(), data).into_bytes()
}
