use std::sync::Arc;

use anyhow::Context;
use milter_alias_common::internal;
use milter_alias_directory::LdapDirectory;
use milter_alias_filter::{Resolver, milter::FILTER_NAME};
use milter_alias_tracing::traced;
use tokio::signal::unix::{SignalKind, signal};

use crate::{
    listener::{self, Listener},
    pid_file::PidFile,
    settings::Settings,
};

/// Completes on the first SIGINT or SIGTERM.
#[traced(instrument(level = tracing::Level::TRACE))]
pub async fn shutdown() {
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                internal!(level = ERROR, "Unable to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "Interrupted, shutting down");
        }
        () = terminate => {
            internal!(level = INFO, "Terminate signal received, shutting down");
        }
    }
}

pub struct MilterAlias {
    settings: Settings,
}

impl MilterAlias {
    pub const fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Serves milter connections until SIGINT or SIGTERM, then tidies up.
    ///
    /// # Errors
    ///
    /// If the socket cannot be bound, the PID file cannot be written, or the
    /// directory cannot be reached. Once serving has started, only a failure
    /// to accept connections is returned.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all, err), timing(precision = "s"))]
    pub async fn run(self) -> anyhow::Result<()> {
        let Settings { socket, pid_file, ldap, .. } = self.settings;

        let listener = Listener::bind(&socket).await?;
        let socket_file = listener.socket_file().map(std::path::Path::to_path_buf);

        let pid_file = match pid_file {
            Some(path) => match PidFile::create(&path).await {
                Ok(pid_file) => Some(pid_file),
                Err(err) => {
                    cleanup(socket_file.as_deref(), None).await;
                    return Err(err);
                }
            },
            None => None,
        };

        let directory = match LdapDirectory::connect(&ldap).await {
            Ok(directory) => Arc::new(directory),
            Err(err) => {
                cleanup(socket_file.as_deref(), pid_file).await;
                return Err(err).context("Unable to reach the directory");
            }
        };

        let resolver = Arc::new(Resolver::new(
            Arc::clone(&directory),
            ldap.mail_list_query,
            ldap.mail_account_query,
        ));

        internal!(level = INFO, "{FILTER_NAME} ready on {socket}");

        let served = listener.serve(&resolver, shutdown()).await;

        internal!(level = INFO, "Shutting down...");

        if let Err(err) = directory.disconnect().await {
            internal!(level = ERROR, "{err}");
        }

        cleanup(socket_file.as_deref(), pid_file).await;

        served.context("Milter sessions failed")
    }
}

async fn cleanup(socket_file: Option<&std::path::Path>, pid_file: Option<PidFile>) {
    if let Some(path) = socket_file {
        listener::remove_socket(path).await;
    }

    if let Some(pid_file) = pid_file {
        pid_file.remove().await;
    }
}
