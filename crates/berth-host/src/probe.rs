use crate::command::{CommandRunner, CommandSpec};
use crate::distro::HostPlatform;
use crate::engine::ContainerEngine;
use std::ffi::CString;

/// Facts about the calling user needed for the authorization check.
pub trait HostIdentity {
    fn platform(&self) -> HostPlatform;

    fn effective_uid(&self) -> u32;

    /// Numeric id of a named group, or `None` when it does not exist or the
    /// lookup fails.
    fn group_id(&self, name: &str) -> Option<u32>;

    /// Groups held by the calling process or granted to the caller in the
    /// user database, or `None` when neither can be read.
    fn caller_group_ids(&self) -> Option<Vec<u32>>;
}

/// Identity of the current process, read through libc.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdentity;

impl HostIdentity for SystemIdentity {
    fn platform(&self) -> HostPlatform {
        HostPlatform::current()
    }

    #[allow(unsafe_code)]
    fn effective_uid(&self) -> u32 {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() }
    }

    fn group_id(&self, name: &str) -> Option<u32> {
        let c_name = CString::new(name).ok()?;

        // SAFETY: a zeroed group struct is a valid initial state; it is only
        // read after getgrnam_r reports success with a non-null result.
        #[allow(unsafe_code, clippy::undocumented_unsafe_blocks)]
        let mut group: libc::group = unsafe { std::mem::zeroed() };
        let mut buf: Vec<libc::c_char> = vec![0; 16 * 1024];
        let mut result: *mut libc::group = std::ptr::null_mut();

        // SAFETY: all pointers reference live, correctly sized buffers owned by
        // this frame, and the name is NUL-terminated.
        #[allow(unsafe_code, clippy::undocumented_unsafe_blocks)]
        let rc = unsafe {
            libc::getgrnam_r(
                c_name.as_ptr(),
                &raw mut group,
                buf.as_mut_ptr(),
                buf.len(),
                &raw mut result,
            )
        };
        if rc != 0 || result.is_null() {
            return None;
        }
        Some(group.gr_gid)
    }

    fn caller_group_ids(&self) -> Option<Vec<u32>> {
        merge_group_ids(process_group_ids(), user_group_ids(self.effective_uid()))
    }
}

/// Union of the process groups and the user database groups. Either source
/// may be missing, but not both.
fn merge_group_ids(process: Option<Vec<u32>>, user: Option<Vec<u32>>) -> Option<Vec<u32>> {
    let mut groups = match (process, user) {
        (None, None) => return None,
        (Some(groups), None) | (None, Some(groups)) => groups,
        (Some(mut groups), Some(extra)) => {
            groups.extend(extra);
            groups
        }
    };
    groups.sort_unstable();
    groups.dedup();
    Some(groups)
}

/// Supplementary groups of this process plus its effective gid.
fn process_group_ids() -> Option<Vec<u32>> {
    // SAFETY: a zero count with a null list only queries the group count.
    #[allow(unsafe_code, clippy::undocumented_unsafe_blocks)]
    let count = unsafe { libc::getgroups(0, std::ptr::null_mut()) };
    if count < 0 {
        return None;
    }

    let mut groups: Vec<libc::gid_t> = vec![0; count as usize];
    // SAFETY: the list has room for exactly `count` entries.
    #[allow(unsafe_code, clippy::undocumented_unsafe_blocks)]
    let filled = unsafe { libc::getgroups(count, groups.as_mut_ptr()) };
    if filled < 0 {
        return None;
    }
    groups.truncate(filled as usize);

    // SAFETY: getegid has no preconditions and cannot fail.
    #[allow(unsafe_code, clippy::undocumented_unsafe_blocks)]
    let egid = unsafe { libc::getegid() };
    if !groups.contains(&egid) {
        groups.push(egid);
    }
    Some(groups)
}

/// Groups the user database assigns to `uid`. A `usermod -aG` since login
/// shows up here before it reaches the process groups.
#[cfg(target_os = "linux")]
fn user_group_ids(uid: u32) -> Option<Vec<u32>> {
    const MAX_GROUPS: libc::c_int = 65_536;

    // SAFETY: a zeroed passwd struct is a valid initial state; it is only
    // read after getpwuid_r reports success with a non-null result.
    #[allow(unsafe_code, clippy::undocumented_unsafe_blocks)]
    let mut passwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buf: Vec<libc::c_char> = vec![0; 16 * 1024];
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    // SAFETY: all pointers reference live, correctly sized buffers owned by
    // this frame.
    #[allow(unsafe_code, clippy::undocumented_unsafe_blocks)]
    let rc = unsafe {
        libc::getpwuid_r(
            uid,
            &raw mut passwd,
            buf.as_mut_ptr(),
            buf.len(),
            &raw mut result,
        )
    };
    if rc != 0 || result.is_null() || passwd.pw_name.is_null() {
        return None;
    }

    let mut capacity: libc::c_int = 64;
    loop {
        let mut groups: Vec<libc::gid_t> = vec![0; usize::try_from(capacity).unwrap_or(0)];
        let mut count = capacity;
        // SAFETY: pw_name points into `buf`, which outlives this call, and the
        // list has room for `count` entries.
        #[allow(unsafe_code, clippy::undocumented_unsafe_blocks)]
        let rc = unsafe {
            libc::getgrouplist(
                passwd.pw_name,
                passwd.pw_gid,
                groups.as_mut_ptr(),
                &raw mut count,
            )
        };
        if rc >= 0 {
            groups.truncate(usize::try_from(count).unwrap_or(0));
            return Some(groups);
        }
        capacity = if count > capacity { count } else { capacity * 2 };
        if capacity > MAX_GROUPS {
            return None;
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn user_group_ids(_uid: u32) -> Option<Vec<u32>> {
    None
}

/// Read-only questions about engine presence, daemon liveness, and whether the
/// caller may use the engine.
pub struct EngineProbe<'a> {
    runner: &'a dyn CommandRunner,
    identity: &'a dyn HostIdentity,
}

impl<'a> EngineProbe<'a> {
    pub fn new(runner: &'a dyn CommandRunner, identity: &'a dyn HostIdentity) -> Self {
        Self { runner, identity }
    }

    fn version_ok(&self, binary: &str) -> bool {
        let ok = self
            .runner
            .succeeds(&CommandSpec::new(binary).arg("--version"));
        tracing::debug!("{binary} --version: {}", if ok { "ok" } else { "failed" });
        ok
    }

    /// Podman counts as installed only together with `podman-compose`.
    pub fn is_engine_installed(&self, engine: ContainerEngine) -> bool {
        match engine {
            ContainerEngine::Docker => self.version_ok("docker"),
            ContainerEngine::Podman => {
                self.version_ok("podman") && self.version_ok("podman-compose")
            }
        }
    }

    /// Whether the Docker daemon answers `docker info`.
    pub fn is_engine_running(&self) -> bool {
        let ok = self
            .runner
            .succeeds(&CommandSpec::new("docker").arg("info"));
        if !ok {
            tracing::warn!("docker info failed, daemon is not reachable");
        }
        ok
    }

    /// macOS and root are always authorized; everyone else must hold the
    /// docker group. Lookup failures count as not authorized.
    pub fn is_caller_authorized(&self) -> bool {
        if self.identity.platform() == HostPlatform::MacOs {
            return true;
        }
        if self.identity.effective_uid() == 0 {
            return true;
        }

        let Some(group) = ContainerEngine::Docker.admin_group() else {
            return false;
        };
        let Some(gid) = self.identity.group_id(group) else {
            tracing::debug!("group '{group}' does not exist");
            return false;
        };
        self.identity
            .caller_group_ids()
            .is_some_and(|ids| ids.contains(&gid))
    }
}
