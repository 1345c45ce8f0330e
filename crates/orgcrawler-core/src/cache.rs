//! On-disk cache for a discovered [`Organization`].
//!
//! Binary MessagePack dump, written atomically (temp file + rename) into a
//! directory created with `0700` permissions. Freshness is judged by file
//! mtime against [`CacheConfig::cache_file_max_age_minutes`].

use std::fs;
use std::io::Write;
use std::time::SystemTime;

use crate::config::CacheConfig;
use crate::error::{OrgError, OrgResult};
use crate::model::{Organization, OrganizationDump};

/// Load the organization cached under `cache_config`, if present and fresh.
///
/// Returns [`OrgError::CacheMissing`] if no file exists, or
/// [`OrgError::CacheStale`] if the file's mtime is older than
/// `cache_file_max_age_minutes`. Callers that want a stale cache anyway
/// should use [`load_ignoring_age`].
pub fn load(cache_config: &CacheConfig) -> OrgResult<Organization> {
    let path = cache_config.cache_path();
    let metadata = fs::metadata(&path).map_err(|_| OrgError::CacheMissing(path.clone()))?;
    let age_minutes = age_in_minutes(&metadata)?;
    if age_minutes > cache_config.cache_file_max_age_minutes {
        return Err(OrgError::CacheStale {
            path,
            age_minutes,
            max_minutes: cache_config.cache_file_max_age_minutes,
        });
    }
    load_ignoring_age(cache_config)
}

/// Load the cached organization regardless of age. Still fails with
/// [`OrgError::CacheMissing`] if no file is present.
pub fn load_ignoring_age(cache_config: &CacheConfig) -> OrgResult<Organization> {
    let path = cache_config.cache_path();
    let bytes = fs::read(&path).map_err(|_| OrgError::CacheMissing(path.clone()))?;
    let dump: OrganizationDump = rmp_serde::from_slice(&bytes)
        .map_err(|e| OrgError::Serialization(format!("decoding {path:?}: {e}")))?;
    Ok(dump.into_organization(cache_config.clone()))
}

/// Serialize `organization` and write it atomically to its configured cache
/// path: write to a sibling temp file, then rename over the destination.
pub fn save(organization: &Organization) -> OrgResult<()> {
    let cache_config = &organization.cache_config;
    ensure_cache_dir(&cache_config.cache_dir)?;

    let dump = OrganizationDump::from(organization);
    let bytes = rmp_serde::to_vec(&dump)
        .map_err(|e| OrgError::Serialization(format!("encoding organization dump: {e}")))?;

    let final_path = cache_config.cache_path();
    let temp_path = final_path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, &final_path)?;
    Ok(())
}

#[cfg(unix)]
fn ensure_cache_dir(dir: &std::path::Path) -> OrgResult<()> {
    use std::os::unix::fs::PermissionsExt;
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_cache_dir(dir: &std::path::Path) -> OrgResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn age_in_minutes(metadata: &fs::Metadata) -> OrgResult<i64> {
    let modified = metadata.modified()?;
    let elapsed = SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default();
    Ok(elapsed.as_secs() as i64 / 60)
}
