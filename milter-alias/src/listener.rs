use std::{
    future::Future,
    io,
    os::unix::fs::FileTypeExt,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use milter_alias_common::{config::Socket, internal};
use milter_alias_directory::Directory;
use milter_alias_filter::{Resolver, milter};
use milter_alias_tracing::traced;
use tokio::net::{TcpListener, UnixListener, UnixStream};

/// Mode for a socket directory we had to create.
const SOCKET_DIR_MODE: u32 = 0o755;

/// A bound milter socket.
#[derive(Debug)]
pub enum Listener {
    Unix { listener: UnixListener, path: PathBuf },
    Tcp(TcpListener),
}

impl Listener {
    /// Binds `socket`, first creating the directory of a Unix socket and
    /// clearing away one left behind by a previous run.
    ///
    /// # Errors
    ///
    /// If the directory cannot be created, the path is taken by something
    /// that is not a stale socket, or the bind itself fails.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all, fields(socket = %socket), err))]
    pub async fn bind(socket: &Socket) -> anyhow::Result<Self> {
        let listener = match socket {
            Socket::Unix(path) => {
                prepare_unix(path).await?;
                let listener = UnixListener::bind(path)
                    .with_context(|| format!("Unable to bind {}", path.display()))?;

                Self::Unix {
                    listener,
                    path: path.clone(),
                }
            }
            Socket::Inet { host, port } => {
                let listener = TcpListener::bind((host.as_str(), *port))
                    .await
                    .with_context(|| format!("Unable to bind {socket}"))?;

                Self::Tcp(listener)
            }
        };

        internal!(level = INFO, "Listening on {socket}");

        Ok(listener)
    }

    /// The file to remove once serving is over.
    pub fn socket_file(&self) -> Option<&Path> {
        match self {
            Self::Unix { path, .. } => Some(path),
            Self::Tcp(_) => None,
        }
    }

    /// Runs milter sessions until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// If accepting connections fails.
    pub async fn serve<D: Directory + 'static>(
        self,
        resolver: &Arc<Resolver<D>>,
        shutdown: impl Future<Output = ()>,
    ) -> io::Result<()> {
        let callbacks = milter::callbacks(resolver);
        let config = milter::config();

        match self {
            Self::Unix { listener, .. } => {
                indymilter::run(listener, callbacks, config, shutdown).await
            }
            Self::Tcp(listener) => indymilter::run(listener, callbacks, config, shutdown).await,
        }
    }
}

async fn prepare_unix(path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        ensure_socket_dir(dir).await?;
    }

    let Ok(metadata) = tokio::fs::symlink_metadata(path).await else {
        return Ok(());
    };

    if !metadata.file_type().is_socket() {
        anyhow::bail!("{} exists and is not a socket", path.display());
    }

    if UnixStream::connect(path).await.is_ok() {
        anyhow::bail!(
            "Socket already in use by running instance: {}",
            path.display()
        );
    }

    internal!(level = INFO, "Removing stale socket file {}", path.display());
    tokio::fs::remove_file(path)
        .await
        .with_context(|| format!("Unable to remove stale socket {}", path.display()))
}

async fn ensure_socket_dir(dir: &Path) -> anyhow::Result<()> {
    if tokio::fs::try_exists(dir).await? {
        return Ok(());
    }

    tokio::fs::DirBuilder::new()
        .recursive(true)
        .mode(SOCKET_DIR_MODE)
        .create(dir)
        .await
        .with_context(|| format!("Unable to create socket directory {}", dir.display()))?;

    internal!(level = INFO, "Created socket directory {}", dir.display());

    Ok(())
}

/// Removes the socket file. Already being gone is fine.
pub async fn remove_socket(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => internal!(level = DEBUG, "Removed socket file {}", path.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => internal!(
            level = ERROR,
            "Unable to remove socket file {}: {err}",
            path.display()
        ),
    }
}
