//! Filename sanitization and in-run collision handling.
//!
//! Photo titles and gallery titles come straight from the site and are used as
//! path components, so they are sanitized before touching the filesystem.
//! When two different images in one run want the same name, the later one is
//! qualified with a prefix of its SHA-256 fingerprint.

use std::future::Future;
use std::path::{Component, Path};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use url::Url;

/// Fingerprint prefix lengths (hex chars) tried when a name is already taken.
const FINGERPRINT_SUFFIX_LENGTHS: [usize; 2] = [8, 64];

/// Fallback name for images with neither a usable title nor URL segment.
const FALLBACK_IMAGE_NAME: &str = "image.bin";

/// Sanitizes a single path component for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |`) and control characters with `_`. Names made only of
/// dots are rewritten so they cannot address the current or parent directory.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Chooses the on-disk name for an image: its title, or the payload URL's last segment.
#[must_use]
pub fn image_filename(title: Option<&str>, src: &Url) -> String {
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        return sanitize_filename(title);
    }
    src.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty())
        .map_or_else(|| FALLBACK_IMAGE_NAME.to_string(), sanitize_filename)
}

/// Chooses the gallery directory name: its title, or the gallery id.
#[must_use]
pub fn gallery_dir_name(title: Option<&str>, gallery_id: &str) -> String {
    title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map_or_else(|| sanitize_filename(gallery_id), sanitize_filename)
}

/// Hex-encoded SHA-256 of `bytes`.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Inserts `-<suffix>` before the extension: `a.jpg` → `a-<suffix>.jpg`.
#[must_use]
pub fn with_fingerprint_suffix(filename: &str, suffix: &str) -> String {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => format!("{}-{suffix}{}", &filename[..pos], &filename[pos..]),
        _ => format!("{filename}-{suffix}"),
    }
}

/// Outcome of claiming a filename for a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The requested name was free and now belongs to this payload.
    Fresh(String),
    /// The requested name was taken by different content; use this qualified name.
    Renamed(String),
    /// Identical content already claimed this name in this run.
    SameContent(String),
}

impl Claim {
    /// The filename to use.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Fresh(name) | Self::Renamed(name) | Self::SameContent(name) => name,
        }
    }
}

/// A claimed name plus the write state shared by everyone holding it.
#[derive(Debug, Clone)]
pub struct NameLease {
    claim: Claim,
    stored: Arc<OnceCell<()>>,
}

impl NameLease {
    /// How the name was obtained.
    #[must_use]
    pub fn claim(&self) -> &Claim {
        &self.claim
    }

    /// The filename to use.
    #[must_use]
    pub fn name(&self) -> &str {
        self.claim.name()
    }

    /// True once some holder of this name has written it successfully.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        self.stored.initialized()
    }

    /// Runs `write` unless a holder of the same name already stored it.
    ///
    /// Concurrent holders wait for the write in progress. If that write
    /// fails, the next waiter runs its own. Returns `Ok(true)` when this call
    /// performed the write and `Ok(false)` when an earlier one had.
    ///
    /// # Errors
    ///
    /// Returns the error from `write`; the name stays unwritten.
    pub async fn store_once<F, Fut, E>(&self, write: F) -> Result<bool, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut wrote = false;
        self.stored
            .get_or_try_init(|| async {
                write().await?;
                wrote = true;
                Ok(())
            })
            .await?;
        Ok(wrote)
    }
}

#[derive(Debug)]
struct NameSlot {
    fingerprint: String,
    stored: Arc<OnceCell<()>>,
}

/// Filenames claimed during one run, with the fingerprint of the content behind each.
///
/// Shared between download workers so concurrent images never silently
/// overwrite each other. Files left over from earlier runs are not tracked and
/// are overwritten.
#[derive(Debug, Default)]
pub struct FilenameRegistry {
    names: DashMap<String, NameSlot>,
}

impl FilenameRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `filename` for content with the given fingerprint.
    ///
    /// Never returns a name held by different content: after the fingerprint
    /// suffixes, a numeric counter is appended until a free name is found.
    #[must_use]
    pub fn claim(&self, filename: &str, content_fingerprint: &str) -> NameLease {
        let suffixed = FINGERPRINT_SUFFIX_LENGTHS.iter().map(|&len| {
            with_fingerprint_suffix(
                filename,
                &content_fingerprint[..len.min(content_fingerprint.len())],
            )
        });
        for candidate in std::iter::once(filename.to_string()).chain(suffixed) {
            if let Some(lease) = self.lease(candidate, filename, content_fingerprint) {
                return lease;
            }
        }

        let mut counter: u64 = 2;
        loop {
            let candidate =
                with_fingerprint_suffix(filename, &format!("{content_fingerprint}-{counter}"));
            if let Some(lease) = self.lease(candidate, filename, content_fingerprint) {
                return lease;
            }
            counter += 1;
        }
    }

    /// Returns the number of claimed names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if no names have been claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn lease(
        &self,
        candidate: String,
        requested: &str,
        content_fingerprint: &str,
    ) -> Option<NameLease> {
        let (fresh, stored) = self.try_claim(&candidate, content_fingerprint)?;
        let claim = if !fresh {
            Claim::SameContent(candidate)
        } else if candidate == requested {
            Claim::Fresh(candidate)
        } else {
            Claim::Renamed(candidate)
        };
        Some(NameLease { claim, stored })
    }

    /// `(true, _)` if newly claimed, `(false, _)` if held by the same content, `None` if held by other content.
    fn try_claim(
        &self,
        name: &str,
        content_fingerprint: &str,
    ) -> Option<(bool, Arc<OnceCell<()>>)> {
        match self.names.entry(name.to_string()) {
            Entry::Vacant(slot) => {
                let stored = Arc::new(OnceCell::new());
                slot.insert(NameSlot {
                    fingerprint: content_fingerprint.to_string(),
                    stored: Arc::clone(&stored),
                });
                Some((true, stored))
            }
            Entry::Occupied(slot) => (slot.get().fingerprint == content_fingerprint)
                .then(|| (false, Arc::clone(&slot.get().stored))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_removes_invalid_chars() {
        assert_eq!(sanitize_filename("a/b.jpg"), "a_b.jpg");
        assert_eq!(sanitize_filename("a\\b.jpg"), "a_b.jpg");
        assert_eq!(sanitize_filename("a:b*c?.jpg"), "a_b_c_.jpg");
        assert_eq!(sanitize_filename("a<b>|\".jpg"), "a_b___.jpg");
        assert_eq!(sanitize_filename("a\nb\u{0}.jpg"), "a_b_.jpg");
    }

    #[test]
    fn test_sanitize_filename_rewrites_dot_segments() {
        assert_eq!(sanitize_filename("."), "_");
        assert_eq!(sanitize_filename(".."), "__");
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
    }

    #[test]
    fn test_sanitize_filename_preserves_valid_chars() {
        assert_eq!(sanitize_filename("beach day (1).jpg"), "beach day (1).jpg");
        assert_eq!(sanitize_filename("日本語.jpg"), "日本語.jpg");
        assert_eq!(sanitize_filename("   "), "_");
    }

    #[test]
    fn test_image_filename_prefers_title() {
        let src = Url::parse("https://cdn.imagefap.com/images/full/1/2/123.jpg").unwrap();
        assert_eq!(image_filename(Some("sunset.jpg"), &src), "sunset.jpg");
    }

    #[test]
    fn test_image_filename_falls_back_to_url_segment() {
        let src = Url::parse("https://cdn.imagefap.com/images/full/1/2/123.jpg?end=1").unwrap();
        assert_eq!(image_filename(None, &src), "123.jpg");
        assert_eq!(image_filename(Some("  "), &src), "123.jpg");
    }

    #[test]
    fn test_image_filename_last_resort() {
        let src = Url::parse("https://cdn.imagefap.com/").unwrap();
        assert_eq!(image_filename(None, &src), "image.bin");
    }

    #[test]
    fn test_gallery_dir_name() {
        assert_eq!(gallery_dir_name(Some("My / Gallery"), "1"), "My _ Gallery");
        assert_eq!(gallery_dir_name(None, "12345678"), "12345678");
        assert_eq!(gallery_dir_name(Some(""), "12345678"), "12345678");
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_with_fingerprint_suffix() {
        assert_eq!(with_fingerprint_suffix("a.jpg", "deadbeef"), "a-deadbeef.jpg");
        assert_eq!(with_fingerprint_suffix("noext", "deadbeef"), "noext-deadbeef");
        assert_eq!(with_fingerprint_suffix(".hidden", "ab"), ".hidden-ab");
    }

    #[test]
    fn test_registry_first_claim_is_fresh() {
        let registry = FilenameRegistry::new();
        let lease = registry.claim("a.jpg", "f1");
        assert_eq!(lease.claim(), &Claim::Fresh("a.jpg".to_string()));
        assert!(!lease.is_stored());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_same_content_shares_name() {
        let registry = FilenameRegistry::new();
        let _ = registry.claim("a.jpg", "f1");
        assert_eq!(
            registry.claim("a.jpg", "f1").claim(),
            &Claim::SameContent("a.jpg".to_string())
        );
    }

    #[test]
    fn test_registry_different_content_is_renamed_with_fingerprint() {
        let registry = FilenameRegistry::new();
        let first = fingerprint(b"one");
        let second = fingerprint(b"two");
        let _ = registry.claim("a.jpg", &first);
        let lease = registry.claim("a.jpg", &second);
        assert_eq!(lease.claim(), &Claim::Renamed(format!("a-{}.jpg", &second[..8])));

        // The same second payload again resolves to its renamed slot.
        assert_eq!(
            registry.claim("a.jpg", &second).claim(),
            &Claim::SameContent(format!("a-{}.jpg", &second[..8]))
        );
    }

    #[test]
    fn test_registry_never_hands_out_name_held_by_other_content() {
        let registry = FilenameRegistry::new();
        let wanted = fingerprint(b"wanted");
        let other = fingerprint(b"other");
        let squatter = fingerprint(b"squatter");
        let short = format!("a-{}.jpg", &wanted[..8]);
        let full = format!("a-{wanted}.jpg");
        let _ = registry.claim("a.jpg", &other);
        let _ = registry.claim(&short, &squatter);
        let _ = registry.claim(&full, &squatter);

        let lease = registry.claim("a.jpg", &wanted);

        assert_eq!(lease.claim(), &Claim::Renamed(format!("a-{wanted}-2.jpg")));
        assert_ne!(lease.name(), full);

        let _ = registry.claim(&format!("a-{wanted}-3.jpg"), &squatter);
        assert_eq!(
            registry.claim("a.jpg", &wanted).claim(),
            &Claim::SameContent(format!("a-{wanted}-2.jpg"))
        );
    }

    #[tokio::test]
    async fn test_failed_write_leaves_name_unstored_for_next_holder() {
        let registry = FilenameRegistry::new();
        let first = registry.claim("a.jpg", "f1");
        let second = registry.claim("a.jpg", "f1");

        let failed: Result<bool, &str> = first.store_once(|| async { Err("disk full") }).await;
        assert_eq!(failed, Err("disk full"));
        assert!(!second.is_stored());

        let wrote: Result<bool, &str> = second.store_once(|| async { Ok(()) }).await;
        assert_eq!(wrote, Ok(true));
        assert!(first.is_stored());

        let again: Result<bool, &str> = first.store_once(|| async { Ok(()) }).await;
        assert_eq!(again, Ok(false));
    }

    #[tokio::test]
    async fn test_concurrent_holders_wait_for_in_flight_write() {
        let registry = FilenameRegistry::new();
        let first = registry.claim("a.jpg", "f1");
        let second = registry.claim("a.jpg", "f1");
        let (release, wait) = tokio::sync::oneshot::channel::<()>();

        let writer = tokio::spawn(async move {
            first
                .store_once(|| async {
                    let _ = wait.await;
                    Ok::<(), &str>(())
                })
                .await
        });
        tokio::task::yield_now().await;
        let follower = tokio::spawn(async move {
            second
                .store_once(|| async { Err::<(), &str>("second writer must not run") })
                .await
        });
        tokio::task::yield_now().await;
        release.send(()).unwrap();

        assert_eq!(writer.await.unwrap(), Ok(true));
        assert_eq!(follower.await.unwrap(), Ok(false));
    }
}
