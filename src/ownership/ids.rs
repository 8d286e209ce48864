//! `owner:group` resolution.
//!
//! Accepted forms (as chown(1)): `user:group`, `user`, `user:` (user and
//! their login group), `:group`. Each side may be a name or a numeric id.

use std::ffi::CString;
use std::io;

/// Resolved ids; `None` leaves that id unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerIds {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

const MAX_BUF: usize = 1 << 20;

fn c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains null byte"))
}

/// (uid, primary gid) of a user name.
fn lookup_user(name: &str) -> io::Result<Option<(u32, u32)>> {
    let c = c_name(name)?;
    let mut buf: Vec<libc::c_char> = vec![0; 4096];
    loop {
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = unsafe { libc::getpwnam_r(c.as_ptr(), &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result) };
        if rc == libc::ERANGE && buf.len() < MAX_BUF {
            let n = buf.len() * 2;
            buf.resize(n, 0);
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        if result.is_null() {
            return Ok(None);
        }
        return Ok(Some((pwd.pw_uid, pwd.pw_gid)));
    }
}

fn lookup_group(name: &str) -> io::Result<Option<u32>> {
    let c = c_name(name)?;
    let mut buf: Vec<libc::c_char> = vec![0; 4096];
    loop {
        let mut grp: libc::group = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::group = std::ptr::null_mut();
        let rc = unsafe { libc::getgrnam_r(c.as_ptr(), &mut grp, buf.as_mut_ptr(), buf.len(), &mut result) };
        if rc == libc::ERANGE && buf.len() < MAX_BUF {
            let n = buf.len() * 2;
            buf.resize(n, 0);
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        if result.is_null() {
            return Ok(None);
        }
        return Ok(Some(grp.gr_gid));
    }
}

fn resolve_user(name: &str) -> Result<(u32, Option<u32>), String> {
    if let Ok(uid) = name.parse::<u32>() {
        return Ok((uid, None));
    }
    match lookup_user(name) {
        Ok(Some((uid, gid))) => Ok((uid, Some(gid))),
        Ok(None) => Err(format!("unknown user '{name}'")),
        Err(e) => Err(format!("cannot look up user '{name}': {e}")),
    }
}

fn resolve_group(name: &str) -> Result<u32, String> {
    if let Ok(gid) = name.parse::<u32>() {
        return Ok(gid);
    }
    match lookup_group(name) {
        Ok(Some(gid)) => Ok(gid),
        Ok(None) => Err(format!("unknown group '{name}'")),
        Err(e) => Err(format!("cannot look up group '{name}': {e}")),
    }
}

/// Resolve an owner:group spec to numeric ids.
pub fn resolve_owner_spec(spec: &str) -> Result<OwnerIds, String> {
    let spec = spec.trim();
    let (user, group) = match spec.split_once(':') {
        Some((u, g)) => (u, Some(g)),
        None => (spec, None),
    };
    if user.is_empty() && group.is_none_or(str::is_empty) {
        return Err(format!("empty owner spec '{spec}'"));
    }

    let mut ids = OwnerIds { uid: None, gid: None };
    let mut login_gid = None;
    if !user.is_empty() {
        let (uid, gid) = resolve_user(user)?;
        ids.uid = Some(uid);
        login_gid = gid;
    }
    match group {
        Some("") => {
            // `user:` means the user's login group.
            ids.gid = Some(login_gid.ok_or_else(|| format!("'{spec}': no login group known for numeric user"))?);
        }
        Some(g) => ids.gid = Some(resolve_group(g)?),
        None => {}
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_forms() {
        assert_eq!(
            resolve_owner_spec("1000:100").unwrap(),
            OwnerIds { uid: Some(1000), gid: Some(100) }
        );
        assert_eq!(resolve_owner_spec("1000").unwrap(), OwnerIds { uid: Some(1000), gid: None });
        assert_eq!(resolve_owner_spec(":100").unwrap(), OwnerIds { uid: None, gid: Some(100) });
    }

    #[test]
    fn root_resolves_by_name() {
        let ids = resolve_owner_spec("root:").unwrap();
        assert_eq!(ids.uid, Some(0));
        assert!(ids.gid.is_some());
    }

    #[test]
    fn rejects_unknown_and_empty() {
        assert!(resolve_owner_spec("no-such-user-tree-move").is_err());
        assert!(resolve_owner_spec(":no-such-group-tree-move").is_err());
        assert!(resolve_owner_spec(":").is_err());
        assert!(resolve_owner_spec("").is_err());
        assert!(resolve_owner_spec("1000:").is_err());
    }
}
