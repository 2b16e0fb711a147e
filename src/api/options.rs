use std::convert::TryFrom;
use std::path::PathBuf;
use tokio::time::Duration;

#[derive(Clone, Default)]
pub struct ServerOptions {
    /// Where update logs and chatroom history files live.
    pub data_directory: Option<PathBuf>,
    /// Discard all existing logs and history at startup.
    pub recreate_files: Option<bool>,
    pub anti_entropy_interval: Option<Duration>,
    pub actor_queue_size: Option<usize>,
    pub resend_batch_size: Option<usize>,
}

pub(super) struct ServerOptionsValidated {
    pub data_directory: PathBuf,
    pub recreate_files: bool,
    pub anti_entropy_interval: Duration,
    pub actor_queue_size: usize,
    pub resend_batch_size: usize,
}

impl ServerOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.anti_entropy_interval.is_zero() {
            return Err("Anti-entropy interval must be greater than zero");
        }
        if self.actor_queue_size == 0 {
            return Err("Actor queue size must be greater than zero");
        }
        if self.resend_batch_size == 0 {
            return Err("Resend batch size must be greater than zero");
        }

        Ok(())
    }
}

impl TryFrom<ServerOptions> for ServerOptionsValidated {
    type Error = &'static str;

    fn try_from(options: ServerOptions) -> Result<Self, Self::Error> {
        let values = ServerOptionsValidated {
            data_directory: options.data_directory.unwrap_or_else(|| PathBuf::from(".")),
            recreate_files: options.recreate_files.unwrap_or(false),
            anti_entropy_interval: options.anti_entropy_interval.unwrap_or(Duration::from_millis(500)),
            actor_queue_size: options.actor_queue_size.unwrap_or(1024),
            resend_batch_size: options.resend_batch_size.unwrap_or(64),
        };

        values.validate()?;
        Ok(values)
    }
}
