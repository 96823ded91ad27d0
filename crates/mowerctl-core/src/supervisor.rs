use crate::config::LauncherConfig;
use crate::permissions::widen_usb_permissions;
use crate::relay::CommandRelay;
use crate::CoreError;
use mowerctl_devices::{provision, DeviceGrant, RosterWriter, UdevQuery};
use mowerctl_runtime::{
    BindMount, ContainerRuntime, LaunchSpec, PortMapping, Role, RuntimeInstance,
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, info, warn};

/// Stops, removes, and launches managed role instances.
///
/// The host runs one deployment at a time, so every (re)start first clears
/// all instances of the managed image family regardless of role. Concurrent
/// supervisors sharing a scratch directory are not guarded against.
pub struct Supervisor<'a> {
    config: &'a LauncherConfig,
    runtime: &'a dyn ContainerRuntime,
    udev: &'a dyn UdevQuery,
}

impl<'a> Supervisor<'a> {
    pub fn new(
        config: &'a LauncherConfig,
        runtime: &'a dyn ContainerRuntime,
        udev: &'a dyn UdevQuery,
    ) -> Self {
        Self {
            config,
            runtime,
            udev,
        }
    }

    pub fn config(&self) -> &LauncherConfig {
        self.config
    }

    /// Stop and remove prior instances, then launch `role`.
    pub fn start(&self, role: Role, progress: &dyn Fn(&str)) -> Result<RuntimeInstance, CoreError> {
        self.check_preconditions()?;
        self.prepare_host();
        self.reset_all(progress)?;
        self.launch(role)
    }

    /// Files that must exist before anything on the host is touched.
    pub fn check_preconditions(&self) -> Result<(), CoreError> {
        if !self.config.credential_file.is_file() {
            return Err(CoreError::MissingCredential(
                self.config.credential_file.clone(),
            ));
        }
        if !self.config.app_config_file.is_file() {
            return Err(CoreError::MissingFile(self.config.app_config_file.clone()));
        }
        Ok(())
    }

    /// Work around USB device permissions lost across host restarts.
    pub fn prepare_host(&self) {
        let root = &self.config.usb_root;
        if !root.exists() {
            debug!("USB root {} absent; skipping permission reset", root.display());
            return;
        }
        match widen_usb_permissions(root) {
            Ok(n) => debug!("widened permissions on {n} entries under {}", root.display()),
            Err(e) => warn!("could not widen USB permissions under {}: {e}", root.display()),
        }
    }

    /// Stop then remove every instance of the managed image family, running
    /// or not. Returns how many were removed.
    pub fn reset_all(&self, progress: &dyn Fn(&str)) -> Result<usize, CoreError> {
        let family = &self.config.runtime.image;
        let instances = self.runtime.list(family, true)?;
        if instances.is_empty() {
            debug!("no prior {family} instances");
            return Ok(0);
        }

        for inst in &instances {
            progress(&format!("stopping {}", inst.short_id()));
            self.runtime
                .stop(&inst.id, self.config.runtime.stop_timeout_secs)?;
            progress(&format!("removing {}", inst.short_id()));
            self.runtime.remove(&inst.id)?;
        }
        info!("removed {} prior instances", instances.len());
        Ok(instances.len())
    }

    /// Purge scratch, regenerate the rosters, and launch one `role` instance.
    /// Does not touch other instances; see [`Self::start`].
    pub fn launch(&self, role: Role) -> Result<RuntimeInstance, CoreError> {
        let devices = self.prepare_launch()?;
        self.launch_with(role, devices)
    }

    /// Host-side state every role instance mounts: a purged scratch directory
    /// holding fresh rosters, and the command channel. Returns the grants.
    pub fn prepare_launch(&self) -> Result<Vec<DeviceGrant>, CoreError> {
        self.purge_scratch()?;
        let devices = self.provision_devices()?;
        CommandRelay::from_config(&self.config.relay).ensure_channel()?;
        Ok(devices)
    }

    /// Launch one `role` instance against state from [`Self::prepare_launch`].
    pub fn launch_with(
        &self,
        role: Role,
        devices: Vec<DeviceGrant>,
    ) -> Result<RuntimeInstance, CoreError> {
        let spec = self.compose(role, devices);
        info!(
            "launching {role} from {} with {} devices",
            spec.image,
            spec.devices.len()
        );
        Ok(self.runtime.launch(&spec)?)
    }

    /// Remove everything inside the scratch directory, creating it if needed.
    pub fn purge_scratch(&self) -> Result<(), CoreError> {
        let scratch = &self.config.scratch_dir;
        std::fs::create_dir_all(scratch)?;
        for entry in std::fs::read_dir(scratch)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }
        debug!("purged {}", scratch.display());
        Ok(())
    }

    /// Write both rosters from a fresh scan and read the grants back.
    pub fn provision_devices(&self) -> Result<Vec<DeviceGrant>, CoreError> {
        let writer = RosterWriter::new(&self.config.sysfs_root)
            .with_policy(self.config.roster_policy());
        let report = writer.write(
            self.udev,
            &self.config.info_roster_path(),
            &self.config.names_roster_path(),
        )?;
        Ok(provision(&report.names_path)?)
    }

    pub fn compose(&self, role: Role, devices: Vec<DeviceGrant>) -> LaunchSpec {
        let cfg = self.config;
        let app_dir = &cfg.runtime.container_app_dir;

        LaunchSpec {
            image: cfg.runtime.image.clone(),
            role,
            env_file: cfg.credential_file.clone(),
            mounts: vec![
                BindMount {
                    source: cfg.credential_file.clone(),
                    target: app_dir.join(file_name_or(&cfg.credential_file, "credentials.env")),
                    read_only: true,
                },
                BindMount::new(
                    &cfg.app_config_file,
                    app_dir.join(file_name_or(&cfg.app_config_file, "config.ini")),
                ),
                BindMount::new(&cfg.scratch_dir, app_dir.join("temp")),
                // Bind-mounted so writes from inside reach the host relay.
                BindMount::new(&cfg.relay.channel, &cfg.relay.container_channel),
            ],
            devices,
            port: PortMapping::same(cfg.port_for(role)),
        }
    }
}

fn file_name_or<'p>(path: &'p Path, fallback: &'p str) -> &'p OsStr {
    path.file_name().unwrap_or_else(|| fallback.as_ref())
}
