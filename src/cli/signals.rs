//! Interrupt handling for the interactive commands

use colored::Colorize;
use tokio::sync::watch;

/// Shutdown signal shared by the recording loop and the prompter renderer
pub struct ShutdownSignal {
    sender: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Observe the shutdown flag
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    /// Request shutdown from inside the program
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Wait until shutdown is requested
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        // The sender lives in self, so the channel cannot close while waiting
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// Listen for Ctrl+C (and SIGTERM on Unix)
    pub fn setup(&self) -> Result<(), std::io::Error> {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!();
                eprintln!("{} Stopping...", "↓".cyan());
                sender.send_replace(true);
            }
        });

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let sender = self.sender.clone();
            let mut sigterm = signal(SignalKind::terminate())?;
            tokio::spawn(async move {
                sigterm.recv().await;
                sender.send_replace(true);
            });
        }

        Ok(())
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
