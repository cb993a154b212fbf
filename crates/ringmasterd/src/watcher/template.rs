//! Per-process argument and environment expansion.

use std::collections::BTreeMap;

use crate::sockets::InheritedSocket;

/// Environment variable listing inherited sockets as `name=fd,...`.
pub const SOCKETS_ENV_VAR: &str = "RINGMASTER_SOCKETS";
/// Environment variable naming the owning watcher.
pub const WATCHER_ENV_VAR: &str = "RINGMASTER_WATCHER";
/// Environment variable carrying the slot number.
pub const WID_ENV_VAR: &str = "RINGMASTER_WID";

/// Expands `$(sockets.NAME)` and `$(wid)` in one argument.
///
/// Unknown placeholders are left as written.
pub(crate) fn expand_arg(arg: &str, wid: usize, sockets: &[InheritedSocket]) -> String {
    let mut expanded = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(start) = rest.find("$(") {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find(')') else {
            expanded.push_str(&rest[start..]);
            return expanded;
        };
        let key = &after[..end];
        match resolve(key, wid, sockets) {
            Some(value) => expanded.push_str(&value),
            None => expanded.push_str(&rest[start..start + end + 3]),
        }
        rest = &after[end + 1..];
    }
    expanded.push_str(rest);
    expanded
}

fn resolve(key: &str, wid: usize, sockets: &[InheritedSocket]) -> Option<String> {
    if key == "wid" {
        return Some(wid.to_string());
    }
    let name = key.strip_prefix("sockets.")?;
    sockets
        .iter()
        .find(|socket| socket.name == name)
        .map(|socket| socket.fd.to_string())
}

/// Builds the child environment: configured variables first, then the
/// supervisor's own variables, which win on conflict.
pub(crate) fn child_env(
    configured: &BTreeMap<String, String>,
    watcher: &str,
    wid: usize,
    sockets: &[InheritedSocket],
) -> BTreeMap<String, String> {
    let mut env = configured.clone();
    let listing = sockets
        .iter()
        .map(|socket| format!("{}={}", socket.name, socket.fd))
        .collect::<Vec<_>>()
        .join(",");
    env.insert(SOCKETS_ENV_VAR.to_owned(), listing);
    env.insert(WATCHER_ENV_VAR.to_owned(), watcher.to_owned());
    env.insert(WID_ENV_VAR.to_owned(), wid.to_string());
    env
}
