//! Flash pipeline
//!
//! [`Flasher`] runs one flash from selectors to a provisioned device:
//! resolve → locate → fetch → verify → await device → backup → flash →
//! restore → provision. Steps run strictly in that order and the first
//! failure aborts the run, tagged with the [`Step`] that failed.


use crate::config::Config;
use crate::device::{AdbShell, DeviceSession, DeviceShell};
use crate::error::{Error, Result};
use crate::process::{ProcessOutcome, ProcessSpec, Supervisor};
use crate::remote::{
    ArtifactSource, Fetcher, HttpIndex, HttpSource, Locator, RemoteIndex, RemoteLocation,
};
use crate::selector::{self, ArtifactPaths, Resolved, Selector, SelectorArgs};
use crate::staging::Staging;
use crate::types::{DeviceState, Event, Step};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Options for one run
#[derive(Clone, Debug, Default)]
pub struct FlashRequest {
    /// Which build to flash
    pub selector: SelectorArgs,
    /// Staging directory (None = temporary directory removed after the run)
    pub dir: Option<PathBuf>,
    /// Use artifacts already in `dir` instead of downloading
    pub local: bool,
    /// Back up the device profile before flashing and restore it afterwards
    pub backup_profile: bool,
    /// Ask the flash script to leave the device profile in place
    pub keep_profile: bool,
    /// Enable development mode once flashed
    pub remotify: bool,
    /// Only enable development mode; no build is resolved or flashed
    pub only_remotify: bool,
}

/// Summary of a successful run
///
/// Paths inside a temporary staging directory no longer exist once
/// [`Flasher::run`] returns.
#[derive(Clone, Debug, Default)]
pub struct FlashReport {
    /// Normalized selector (None for provisioning-only runs)
    pub selector: Option<Selector>,
    /// Local artifact paths
    pub paths: Option<ArtifactPaths>,
    /// Where the build was found (None when local files were used)
    pub location: Option<RemoteLocation>,
    /// Flash script outcome
    pub flash: Option<ProcessOutcome>,
    /// Final device session state when provisioning ran
    pub device_state: Option<DeviceState>,
}

/// External collaborators of the pipeline
///
/// Tests swap these for in-memory doubles.
#[derive(Clone)]
pub struct Collaborators {
    /// Remote directory listing
    pub index: Arc<dyn RemoteIndex>,
    /// Remote file streams
    pub source: Arc<dyn ArtifactSource>,
    /// Device command channel
    pub shell: Arc<dyn DeviceShell>,
}

impl Collaborators {
    /// HTTP index and source for the configured server, adb for the device
    ///
    /// # Errors
    /// Returns error if an HTTP client cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let adb = config.tools.adb();
        tracing::debug!(adb = %adb.display(), "using adb binary");
        Ok(Self {
            index: Arc::new(HttpIndex::new(
                &config.remote.base_url,
                config.remote.listing_timeout,
            )?),
            source: Arc::new(HttpSource::new()?),
            shell: Arc::new(AdbShell::new(adb)),
        })
    }
}

/// Runs flashes
pub struct Flasher {
    config: Config,
    locator: Locator,
    fetcher: Fetcher,
    shell: Arc<dyn DeviceShell>,
    supervisor: Supervisor,
    event_tx: broadcast::Sender<Event>,
}

impl Flasher {
    /// Create a flasher with the default collaborators for `config`
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or an HTTP client cannot
    /// be created
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let collaborators = Collaborators::from_config(&config)?;
        Ok(Self::new(config, collaborators))
    }

    /// Create a flasher with explicit collaborators
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            locator: Locator::new(collaborators.index, &config.remote),
            fetcher: Fetcher::new(collaborators.source).with_events(event_tx.clone()),
            shell: collaborators.shell,
            supervisor: Supervisor::new(event_tx.clone()),
            config,
            event_tx,
        }
    }

    /// Subscribe to run events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls more than 1000 events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Receive every line printed by the flash and backup scripts
    ///
    /// Unlike [`Flasher::subscribe`], no line is ever dropped. The stream ends
    /// when the flasher is dropped. Calling this again replaces the previous
    /// receiver.
    pub fn tool_output(&mut self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.supervisor.set_output(tx);
        rx
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn emit(&self, event: Event) {
        // no subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Run one step, publishing its start and completion and tagging its error
    async fn step<T>(&self, step: Step, work: impl Future<Output = Result<T>>) -> Result<T> {
        tracing::debug!(%step, "step started");
        self.emit(Event::StepStarted { step });
        match work.await {
            Ok(value) => {
                self.emit(Event::StepCompleted { step });
                Ok(value)
            }
            Err(e) => {
                tracing::error!(%step, error = %e, "step failed");
                Err(e.at(step))
            }
        }
    }

    /// Run a flash
    ///
    /// # Errors
    ///
    /// Returns [`Error::Step`] naming the failed step; use
    /// [`Error::root_cause`] for the underlying error.
    pub async fn run(&self, request: &FlashRequest) -> Result<FlashReport> {
        let mut report = FlashReport::default();

        if request.only_remotify {
            report.device_state = Some(self.step(Step::Provision, self.provision()).await?);
            return Ok(report);
        }

        if request.local && request.dir.is_none() {
            return Err(Error::Config {
                message: "local files require a staging directory".to_string(),
                key: Some("dir".to_string()),
            }
            .at(Step::Resolve));
        }

        let (staging, resolved) = self
            .step(Step::Resolve, async {
                let staging = Staging::open(request.dir.as_deref())?;
                let resolved = selector::resolve(&request.selector, staging.path())?;
                tracing::info!(
                    pattern = %resolved.pattern,
                    gaia = %resolved.paths.gaia.display(),
                    gecko = %resolved.paths.gecko.display(),
                    "resolved selectors"
                );
                Ok::<_, Error>((staging, resolved))
            })
            .await?;
        self.emit(Event::Resolved {
            pattern: resolved.pattern.as_str().to_string(),
            gaia_path: resolved.paths.gaia.clone(),
            gecko_path: resolved.paths.gecko.clone(),
        });
        let Resolved {
            selector,
            pattern,
            paths,
        } = resolved;

        if !request.local {
            let location = self
                .step(
                    Step::Locate,
                    self.locator.locate(&self.config.remote.base_path, &pattern),
                )
                .await?;
            self.emit(Event::Located {
                directory: location.directory().to_string(),
                artifact: location.gecko_name().unwrap_or_default().to_string(),
            });

            self.step(
                Step::Fetch,
                self.fetcher.fetch(&self.config.remote.base_url, &location, &paths),
            )
            .await?;
            report.location = Some(location);
        }

        self.step(Step::VerifyLocal, async {
            match paths.first_missing() {
                Some(path) => Err(Error::MissingLocalArtifact {
                    path: path.to_path_buf(),
                }),
                None => Ok(()),
            }
        })
        .await?;

        self.step(Step::AwaitDevice, async {
            tracing::info!("waiting for device (is remote debugging on?)");
            self.shell.wait_for_device().await
        })
        .await?;

        if request.backup_profile {
            self.step(
                Step::BackupProfile,
                self.backup_restore(staging.path(), &staging.profile_dir(), &["-b"]),
            )
            .await?;
        }

        let flash = self
            .step(Step::Flash, self.flash(&staging, &paths, request.keep_profile))
            .await?;
        report.flash = Some(flash);

        if request.backup_profile {
            self.step(
                Step::RestoreProfile,
                self.backup_restore(
                    staging.path(),
                    &staging.profile_dir(),
                    &["--no-reboot", "-r"],
                ),
            )
            .await?;
        }

        if request.remotify {
            report.device_state = Some(self.step(Step::Provision, self.provision()).await?);
        }

        tracing::info!(
            device = %selector.device,
            channel = %selector.channel,
            "flash complete"
        );
        report.selector = Some(selector);
        report.paths = Some(paths);
        Ok(report)
    }

    async fn flash(
        &self,
        staging: &Staging,
        paths: &ArtifactPaths,
        keep_profile: bool,
    ) -> Result<ProcessOutcome> {
        let style = self.config.tools.flag_style;
        let mut spec = ProcessSpec::new("shallow_flash", self.config.tools.flash_script())
            .args(style.option("--gaia", &paths.gaia))
            .args(style.option("--gecko", &paths.gecko))
            .args(["-y"])
            .cwd(staging.path())
            .env(
                "PROFILE_HOME",
                staging.profile_dir().display().to_string(),
            );
        if keep_profile {
            spec = spec.args(["--keep_profile"]);
        }
        self.supervisor.run(&spec).await
    }

    async fn backup_restore(
        &self,
        staging_dir: &Path,
        profile_dir: &Path,
        mode: &[&str],
    ) -> Result<ProcessOutcome> {
        let spec = ProcessSpec::new(
            "backup_restore_profile",
            self.config.tools.backup_script(),
        )
        .args(self.config.tools.flag_style.option("-p", profile_dir))
        .args(mode.iter().copied())
        .cwd(staging_dir);
        self.supervisor.run(&spec).await
    }

    async fn provision(&self) -> Result<DeviceState> {
        let mut session = DeviceSession::new(self.shell.clone(), self.config.device.clone());
        session.provision().await?;
        Ok(session.state().unwrap_or(DeviceState::Restarted))
    }
}
