//! `--payload-file` dynamic plugin loading.
//!
//! The source resolves payload functions with `importlib.import_module`
//! against an arbitrary file path. Rust has no equivalent dynamic import, so
//! a plugin is a cdylib exporting one C ABI entry point:
//!
//! ```c
//! char *orgcrawler_payload(const char *request_json);
//! void orgcrawler_free_string(char *ptr);
//! ```
//!
//! `request_json` is `{"region", "account_id", "account_name",
//! "access_key_id", "secret_access_key", "session_token", "args",
//! "named_args"}`, where `args` is the positional arguments in order and
//! `named_args` the `key=value` ones; the returned string is JSON
//! `{"ok": <value>}` or `{"err": "<message>"}`,
//! owned by the plugin and freed through `orgcrawler_free_string`. Because
//! the call crosses an FFI boundary it runs synchronously inside the
//! crawler's worker task rather than truly concurrently with it — a slow
//! plugin call holds its worker-pool permit for its whole duration.

use std::ffi::{c_char, CStr, CString};

use async_trait::async_trait;
use libloading::{Library, Symbol};
use orgcrawler_core::{Account, OrgError, OrgResult, Payload, PayloadArgs};

type EntryPoint = unsafe extern "C" fn(*const c_char) -> *mut c_char;
type FreeString = unsafe extern "C" fn(*mut c_char);

/// A payload implementation backed by a loaded `cdylib`.
pub struct PluginPayload {
    // Kept alive for the process lifetime of the crawl: dropping it would
    // unmap the code `entry_point`/`free_string` point into.
    _library: Library,
    entry_point: EntryPoint,
    free_string: FreeString,
}

impl PluginPayload {
    /// Load `path` and resolve its `orgcrawler_payload`/`orgcrawler_free_string`
    /// symbols.
    ///
    /// # Safety
    /// Loads and executes arbitrary native code from `path`. The caller is
    /// responsible for only pointing this at a trusted plugin.
    pub unsafe fn load(path: &std::path::Path) -> OrgResult<Self> {
        let library = Library::new(path)
            .map_err(|e| OrgError::Transport(format!("loading payload plugin {path:?}: {e}")))?;
        let entry_point: Symbol<EntryPoint> = library
            .get(b"orgcrawler_payload\0")
            .map_err(|e| OrgError::Transport(format!("plugin {path:?} missing orgcrawler_payload: {e}")))?;
        let free_string: Symbol<FreeString> = library
            .get(b"orgcrawler_free_string\0")
            .map_err(|e| OrgError::Transport(format!("plugin {path:?} missing orgcrawler_free_string: {e}")))?;
        let entry_point = *entry_point;
        let free_string = *free_string;
        Ok(Self {
            _library: library,
            entry_point,
            free_string,
        })
    }
}

#[async_trait]
impl Payload for PluginPayload {
    async fn call(&self, region: &str, account: &Account, args: &PayloadArgs) -> OrgResult<serde_json::Value> {
        let creds = account.credentials.as_ref().ok_or_else(|| OrgError::Transport(
            format!("no credentials loaded for account {}", account.id()),
        ))?;
        let request = serde_json::json!({
            "region": region,
            "account_id": account.id(),
            "account_name": account.name(),
            "access_key_id": creds.access_key_id,
            "secret_access_key": creds.secret_access_key,
            "session_token": creds.session_token,
            "args": args.positional,
            "named_args": args.named,
        });
        let request = CString::new(request.to_string())
            .map_err(|e| OrgError::Transport(format!("payload request is not valid C string: {e}")))?;

        // SAFETY: `entry_point` was resolved from the loaded library and
        // matches the documented ABI; `request` stays alive for the call.
        let raw = unsafe { (self.entry_point)(request.as_ptr()) };
        if raw.is_null() {
            return Err(OrgError::Payload {
                account_id: account.id().to_string(),
                region: region.to_string(),
                message: "plugin returned a null response".to_string(),
            });
        }

        // SAFETY: non-null per above; the plugin guarantees a NUL-terminated
        // string owned until we call `free_string`.
        let response = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
        unsafe { (self.free_string)(raw) };

        let value: serde_json::Value = serde_json::from_str(&response).map_err(|e| OrgError::Payload {
            account_id: account.id().to_string(),
            region: region.to_string(),
            message: format!("plugin returned invalid JSON: {e}"),
        })?;

        if let Some(err) = value.get("err").and_then(|v| v.as_str()) {
            return Err(OrgError::Payload {
                account_id: account.id().to_string(),
                region: region.to_string(),
                message: err.to_string(),
            });
        }
        Ok(value.get("ok").cloned().unwrap_or(serde_json::Value::Null))
    }
}
