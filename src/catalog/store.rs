use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{
    AdminAction, BlockedIp, Diff, Feedback, Progression, ProgressionDraft, ProgressionSummary,
    Status,
};
use crate::error::{Error, Result};
use crate::notation::PATTERN_SLOTS;
use crate::search::{normalize_chords_for_search, normalize_search_query};

const MAX_TITLE_CHARS: usize = 255;
const MAX_LABEL_CHARS: usize = 100;
const MAX_IP_CHARS: usize = 45;

/// Client address of a request: the first `X-Forwarded-For` hop when the
/// request came through a proxy, otherwise the peer address.
pub fn client_ip(forwarded_for: Option<&str>, peer: Option<&str>) -> String {
    if let Some(first) = forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
    {
        return first.to_string();
    }
    peer.unwrap_or("unknown").to_string()
}

fn validate_draft(draft: &ProgressionDraft) -> Result<()> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(Error::InvalidInput(format!(
            "title is longer than {MAX_TITLE_CHARS} characters"
        )));
    }
    for pattern in &draft.patterns {
        if pattern.label.chars().count() > MAX_LABEL_CHARS {
            return Err(Error::InvalidInput(format!(
                "pattern label '{}' is longer than {MAX_LABEL_CHARS} characters",
                pattern.label
            )));
        }
        if pattern.chords.len() > PATTERN_SLOTS {
            return Err(Error::InvalidInput(format!(
                "pattern '{}' has {} slots, at most {PATTERN_SLOTS} are allowed",
                pattern.label,
                pattern.chords.len()
            )));
        }
    }
    for song in &draft.songs {
        if song.name.trim().is_empty() {
            return Err(Error::InvalidInput("song name must not be empty".to_string()));
        }
    }
    Ok(())
}

fn validate_ip(ip: &str) -> Result<()> {
    if ip.chars().count() > MAX_IP_CHARS {
        return Err(Error::InvalidInput(format!("'{ip}' is not an IP address")));
    }
    Ok(())
}

/// Every progression, block-list entry and feedback message, persisted as
/// one YAML document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Catalog {
    #[serde(default)]
    progressions: Vec<Progression>,
    #[serde(default)]
    blocked_ips: Vec<BlockedIp>,
    #[serde(default)]
    feedbacks: Vec<Feedback>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog file. A missing or empty file is an empty catalog.
    pub fn load(path: &Path) -> Result<Catalog> {
        if !path.exists() {
            info!("No catalog at {}, starting empty", path.display());
            return Ok(Catalog::new());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Catalog::new());
        }
        let catalog: Catalog = serde_yaml::from_str(&content)?;
        debug!(
            "Loaded {} progressions from {}",
            catalog.progressions.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Write the catalog to a temporary file next to `path`, then rename it
    /// over `path`. A failed write leaves the previous file untouched.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                dir
            }
            None => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(serde_yaml::to_string(self)?.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;
        debug!("Saved catalog to {}", path.display());
        Ok(())
    }

    pub fn check_ip_blocked(&self, ip: &str) -> Result<()> {
        if self.blocked_ips.iter().any(|b| b.ip_address == ip) {
            warn!("Rejected request from blocked address {ip}");
            return Err(Error::Blocked(ip.to_string()));
        }
        Ok(())
    }

    fn insert_pending(
        &mut self,
        draft: ProgressionDraft,
        ip: &str,
        original_id: Option<Uuid>,
    ) -> Result<Progression> {
        self.check_ip_blocked(ip)?;
        validate_ip(ip)?;
        validate_draft(&draft)?;

        let now = Utc::now();
        let progression = Progression {
            id: Uuid::new_v4(),
            normalized_chords: normalize_chords_for_search(&draft.patterns),
            title: draft.title.trim().to_string(),
            remarks: draft.remarks,
            status: Status::Pending,
            patterns: draft.patterns,
            songs: draft.songs,
            created_at: now,
            updated_at: now,
            ip_address: Some(ip.to_string()),
            original_id,
        };
        self.progressions.push(progression.clone());
        Ok(progression)
    }

    /// Store a new submission awaiting moderation.
    pub fn submit(&mut self, draft: ProgressionDraft, ip: &str) -> Result<Progression> {
        let progression = self.insert_pending(draft, ip, None)?;
        info!("New submission {} '{}' from {ip}", progression.id, progression.title);
        Ok(progression)
    }

    /// Store an edit of an approved progression. The edit replaces the
    /// original once approved.
    pub fn request_edit(
        &mut self,
        original_id: Uuid,
        draft: ProgressionDraft,
        ip: &str,
    ) -> Result<Progression> {
        self.get_approved(original_id)?;
        let progression = self.insert_pending(draft, ip, Some(original_id))?;
        info!("Edit request {} for {original_id} from {ip}", progression.id);
        Ok(progression)
    }

    /// Approved progressions, newest first. `query` matches title or remarks,
    /// `chord_query` matches the chord search form; both ignore case.
    pub fn list_approved(
        &self,
        query: Option<&str>,
        chord_query: Option<&str>,
    ) -> Vec<ProgressionSummary> {
        let text = query.filter(|q| !q.is_empty()).map(str::to_lowercase);
        let chords = chord_query
            .filter(|q| !q.is_empty())
            .map(|q| normalize_search_query(Some(q)).to_lowercase());

        let mut found: Vec<&Progression> = self
            .progressions
            .iter()
            .rev()
            .filter(|p| p.status == Status::Approved)
            .filter(|p| match &text {
                Some(t) => {
                    p.title.to_lowercase().contains(t)
                        || p.remarks
                            .as_deref()
                            .is_some_and(|r| r.to_lowercase().contains(t))
                }
                None => true,
            })
            .filter(|p| match &chords {
                Some(c) => p.normalized_chords.to_lowercase().contains(c.as_str()),
                None => true,
            })
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        debug!(
            "Search query={:?} chords={:?}: {} results",
            text,
            chords,
            found.len()
        );
        found.into_iter().map(ProgressionSummary::from).collect()
    }

    pub fn get_approved(&self, id: Uuid) -> Result<&Progression> {
        self.progressions
            .iter()
            .find(|p| p.id == id && p.status == Status::Approved)
            .ok_or_else(|| Error::NotFound(format!("progression {id}")))
    }

    fn get_pending(&self, id: Uuid) -> Result<&Progression> {
        self.progressions
            .iter()
            .find(|p| p.id == id && p.status == Status::Pending)
            .ok_or_else(|| Error::NotFound(format!("pending progression {id}")))
    }

    /// Submissions awaiting moderation, oldest first.
    pub fn pending(&self) -> Vec<&Progression> {
        let mut pending: Vec<&Progression> = self
            .progressions
            .iter()
            .filter(|p| p.status == Status::Pending)
            .collect();
        pending.sort_by_key(|p| p.created_at);
        pending
    }

    pub fn diff(&self, id: Uuid) -> Result<Diff> {
        let updated = self.get_pending(id)?.clone();
        let original = updated
            .original_id
            .and_then(|orig| self.progressions.iter().find(|p| p.id == orig))
            .cloned();
        Ok(Diff { original, updated })
    }

    /// Approve or reject a pending submission. Approving an edit deletes the
    /// progression it replaces; rejecting deletes the submission.
    pub fn process(&mut self, id: Uuid, action: AdminAction) -> Result<()> {
        let original_id = self.get_pending(id)?.original_id;

        match action {
            AdminAction::Approve => {
                if let Some(orig) = original_id {
                    self.progressions.retain(|p| p.id != orig);
                    for p in self.progressions.iter_mut() {
                        if p.original_id == Some(orig) {
                            p.original_id = None;
                        }
                    }
                    info!("Replaced {orig} with {id}");
                }
                let now = Utc::now();
                if let Some(p) = self.progressions.iter_mut().find(|p| p.id == id) {
                    p.status = Status::Approved;
                    p.original_id = None;
                    p.updated_at = now;
                }
                info!("Approved {id}");
            }
            AdminAction::Reject => {
                self.progressions.retain(|p| p.id != id);
                info!("Rejected {id}");
            }
        }
        Ok(())
    }

    /// Block list, most recent first.
    pub fn blocked_ips(&self) -> Vec<&BlockedIp> {
        let mut blocked: Vec<&BlockedIp> = self.blocked_ips.iter().rev().collect();
        blocked.sort_by(|a, b| b.blocked_at.cmp(&a.blocked_at));
        blocked
    }

    pub fn block_ip(&mut self, ip: &str, reason: Option<&str>) -> Result<BlockedIp> {
        let ip = ip.trim();
        if ip.is_empty() {
            return Err(Error::InvalidInput("IP address must not be empty".to_string()));
        }
        validate_ip(ip)?;
        if self.blocked_ips.iter().any(|b| b.ip_address == ip) {
            return Err(Error::AlreadyBlocked(ip.to_string()));
        }
        let blocked = BlockedIp {
            id: Uuid::new_v4(),
            ip_address: ip.to_string(),
            reason: reason.map(str::to_string),
            blocked_at: Utc::now(),
        };
        self.blocked_ips.push(blocked.clone());
        info!("Blocked {ip}");
        Ok(blocked)
    }

    pub fn unblock_ip(&mut self, id: Uuid) -> Result<BlockedIp> {
        let idx = self
            .blocked_ips
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| Error::NotFound(format!("block entry {id}")))?;
        let removed = self.blocked_ips.remove(idx);
        info!("Unblocked {}", removed.ip_address);
        Ok(removed)
    }

    pub fn add_feedback(&mut self, content: &str, ip: &str) -> Result<Feedback> {
        self.check_ip_blocked(ip)?;
        validate_ip(ip)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidInput("feedback must not be empty".to_string()));
        }
        let feedback = Feedback {
            id: Uuid::new_v4(),
            content: content.to_string(),
            created_at: Utc::now(),
            ip_address: Some(ip.to_string()),
        };
        self.feedbacks.push(feedback.clone());
        info!("Feedback {} from {ip}", feedback.id);
        Ok(feedback)
    }

    /// Feedback messages, newest first.
    pub fn feedbacks(&self) -> Vec<&Feedback> {
        let mut feedbacks: Vec<&Feedback> = self.feedbacks.iter().rev().collect();
        feedbacks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        feedbacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::{Pattern, Song};
    use crate::search::search_in_normalized;

    fn royal_road() -> ProgressionDraft {
        ProgressionDraft {
            title: "Royal road".to_string(),
            remarks: Some("Classic J-pop progression".to_string()),
            patterns: vec![
                Pattern::new(
                    "basic",
                    &[Some("Ⅳmaj7"), Some("Ⅴ7"), Some("Ⅲm7"), Some("Ⅵm"), None],
                ),
                Pattern::new(
                    "variant",
                    &[Some("Ⅳ"), None, Some("Ⅴ"), Some("Ⅲ"), Some("Ⅵm")],
                ),
            ],
            songs: vec![],
        }
    }

    fn canon() -> ProgressionDraft {
        ProgressionDraft {
            title: "Canon".to_string(),
            remarks: None,
            patterns: vec![Pattern::new(
                "canon",
                &[
                    Some("I"),
                    Some("V"),
                    Some("VIm"),
                    Some("IIIm"),
                    Some("IV"),
                    Some("I"),
                    Some("IV"),
                    Some("V"),
                ],
            )],
            songs: vec![],
        }
    }

    fn approved(catalog: &mut Catalog, draft: ProgressionDraft) -> Uuid {
        let id = catalog.submit(draft, "10.0.0.1").unwrap().id;
        catalog.process(id, AdminAction::Approve).unwrap();
        id
    }

    #[test]
    fn test_submit_stores_search_form() {
        let mut catalog = Catalog::new();
        let p = catalog.submit(royal_road(), "10.0.0.1").unwrap();
        assert_eq!(p.status, Status::Pending);
        assert_eq!(p.normalized_chords, "IVmaj7|V7|IIIm7|VIm||IV|V|III|VIm");
        assert_eq!(p.ip_address.as_deref(), Some("10.0.0.1"));
        // Raw patterns are kept as typed.
        assert_eq!(p.patterns[0].chords[0].as_deref(), Some("Ⅳmaj7"));
        assert_eq!(catalog.pending().len(), 1);
    }

    #[test]
    fn test_pending_is_not_listed() {
        let mut catalog = Catalog::new();
        let id = catalog.submit(royal_road(), "10.0.0.1").unwrap().id;
        assert!(catalog.list_approved(None, None).is_empty());
        assert!(matches!(catalog.get_approved(id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_search_by_chords() {
        let mut catalog = Catalog::new();
        let royal = approved(&mut catalog, royal_road());
        let canon = approved(&mut catalog, canon());

        let hits = catalog.list_approved(None, Some("|Ⅲm7||Ⅵm|"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, royal);

        let hits = catalog.list_approved(None, Some("vim iiim"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, canon);

        let hits = catalog.list_approved(None, Some("IV-V"));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, canon);
        assert_eq!(hits[1].id, royal);

        assert!(catalog.list_approved(None, Some("VII|II")).is_empty());
    }

    #[test]
    fn test_delimiter_only_chord_query_lists_everything() {
        let mut catalog = Catalog::new();
        let royal = approved(&mut catalog, royal_road());
        approved(&mut catalog, canon());

        let hits = catalog.list_approved(None, Some("| - |"));
        assert_eq!(hits.len(), 2);

        let stored = &catalog.get_approved(royal).unwrap().normalized_chords;
        assert!(search_in_normalized(stored, "| - |"));
    }

    #[test]
    fn test_search_by_text() {
        let mut catalog = Catalog::new();
        let royal = approved(&mut catalog, royal_road());
        approved(&mut catalog, canon());

        let hits = catalog.list_approved(Some("j-POP"), None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, royal);

        let hits = catalog.list_approved(Some("canon"), Some("IV V"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Canon");
        assert_eq!(catalog.list_approved(Some(""), None).len(), 2);
    }

    #[test]
    fn test_reject_deletes_submission() {
        let mut catalog = Catalog::new();
        let id = catalog.submit(royal_road(), "10.0.0.1").unwrap().id;
        catalog.process(id, AdminAction::Reject).unwrap();
        assert!(catalog.pending().is_empty());
        assert!(matches!(
            catalog.process(id, AdminAction::Approve),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_approved_edit_replaces_original() {
        let mut catalog = Catalog::new();
        let original = approved(&mut catalog, royal_road());

        let mut draft = royal_road();
        draft.title = "Royal road (fixed)".to_string();
        draft.patterns.truncate(1);
        let edit = catalog.request_edit(original, draft, "10.0.0.2").unwrap();
        assert_eq!(edit.original_id, Some(original));
        assert_eq!(edit.normalized_chords, "IVmaj7|V7|IIIm7|VIm");

        let diff = catalog.diff(edit.id).unwrap();
        assert_eq!(diff.original.unwrap().id, original);
        assert_eq!(diff.updated.title, "Royal road (fixed)");

        catalog.process(edit.id, AdminAction::Approve).unwrap();
        assert!(catalog.get_approved(original).is_err());
        let replaced = catalog.get_approved(edit.id).unwrap();
        assert_eq!(replaced.original_id, None);
        assert_eq!(catalog.list_approved(None, None).len(), 1);
    }

    #[test]
    fn test_other_edits_lose_their_original() {
        let mut catalog = Catalog::new();
        let original = approved(&mut catalog, royal_road());
        let first = catalog.request_edit(original, royal_road(), "10.0.0.2").unwrap().id;
        let second = catalog.request_edit(original, canon(), "10.0.0.3").unwrap().id;

        catalog.process(first, AdminAction::Approve).unwrap();
        let diff = catalog.diff(second).unwrap();
        assert!(diff.original.is_none());
        assert_eq!(diff.updated.original_id, None);
    }

    #[test]
    fn test_edit_requires_approved_original() {
        let mut catalog = Catalog::new();
        let pending = catalog.submit(royal_road(), "10.0.0.1").unwrap().id;
        assert!(matches!(
            catalog.request_edit(pending, canon(), "10.0.0.1"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            catalog.request_edit(Uuid::new_v4(), canon(), "10.0.0.1"),
            Err(Error::NotFound(_))
        ));
        assert!(catalog.diff(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_blocked_ip_cannot_submit() {
        let mut catalog = Catalog::new();
        let entry = catalog.block_ip(" 192.0.2.7 ", Some("spam")).unwrap();
        assert_eq!(entry.ip_address, "192.0.2.7");
        assert!(matches!(
            catalog.block_ip("192.0.2.7", None),
            Err(Error::AlreadyBlocked(_))
        ));
        assert!(matches!(
            catalog.submit(royal_road(), "192.0.2.7"),
            Err(Error::Blocked(_))
        ));
        assert!(matches!(
            catalog.add_feedback("hello", "192.0.2.7"),
            Err(Error::Blocked(_))
        ));
        assert!(catalog.submit(royal_road(), "192.0.2.8").is_ok());

        catalog.unblock_ip(entry.id).unwrap();
        assert!(catalog.blocked_ips().is_empty());
        assert!(catalog.submit(royal_road(), "192.0.2.7").is_ok());
        assert!(matches!(catalog.unblock_ip(entry.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_draft_validation() {
        let mut catalog = Catalog::new();

        let mut draft = canon();
        draft.title = "   ".to_string();
        assert!(matches!(catalog.submit(draft, "10.0.0.1"), Err(Error::InvalidInput(_))));

        let mut draft = canon();
        draft.title = "x".repeat(256);
        assert!(matches!(catalog.submit(draft, "10.0.0.1"), Err(Error::InvalidInput(_))));

        let mut draft = canon();
        draft.patterns[0].label = "l".repeat(101);
        assert!(matches!(catalog.submit(draft, "10.0.0.1"), Err(Error::InvalidInput(_))));

        let mut draft = canon();
        draft.patterns[0].chords = vec![Some("I".to_string()); 17];
        assert!(matches!(catalog.submit(draft, "10.0.0.1"), Err(Error::InvalidInput(_))));

        let mut draft = canon();
        draft.songs.push(Song {
            name: String::new(),
            artist: None,
            youtube_url: None,
            spotify_url: None,
            apple_music_url: None,
        });
        assert!(matches!(catalog.submit(draft, "10.0.0.1"), Err(Error::InvalidInput(_))));

        assert!(matches!(
            catalog.submit(canon(), &"1".repeat(46)),
            Err(Error::InvalidInput(_))
        ));
        assert!(catalog.pending().is_empty());
    }

    #[test]
    fn test_feedback() {
        let mut catalog = Catalog::new();
        assert!(catalog.add_feedback("  ", "10.0.0.1").is_err());
        catalog.add_feedback("first", "10.0.0.1").unwrap();
        catalog.add_feedback("second", "10.0.0.2").unwrap();
        let all = catalog.feedbacks();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content, "second");
    }

    #[test]
    fn test_client_ip() {
        assert_eq!(client_ip(Some("203.0.113.5, 10.0.0.1"), Some("10.0.0.1")), "203.0.113.5");
        assert_eq!(client_ip(Some(""), Some("10.0.0.9")), "10.0.0.9");
        assert_eq!(client_ip(None, None), "unknown");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("catalog.yml");

        let mut catalog = Catalog::new();
        let royal = approved(&mut catalog, royal_road());
        catalog.submit(canon(), "10.0.0.1").unwrap();
        catalog.block_ip("192.0.2.7", None).unwrap();
        catalog.save(&path).unwrap();

        let loaded = Catalog::load(&path).unwrap();
        assert_eq!(loaded.get_approved(royal).unwrap().title, "Royal road");
        assert_eq!(loaded.pending().len(), 1);
        assert_eq!(loaded.blocked_ips().len(), 1);
        assert_eq!(loaded.list_approved(None, Some("Ⅳmaj7 Ⅴ7")).len(), 1);
    }

    #[test]
    fn test_save_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yml");

        let mut catalog = Catalog::new();
        catalog.submit(canon(), "10.0.0.1").unwrap();
        catalog.save(&path).unwrap();
        catalog.submit(royal_road(), "10.0.0.2").unwrap();
        catalog.save(&path).unwrap();

        assert_eq!(Catalog::load(&path).unwrap().pending().len(), 2);
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("catalog.yml")]);
    }

    #[test]
    fn test_load_missing_or_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Catalog::load(&dir.path().join("nothing.yml")).unwrap();
        assert!(missing.pending().is_empty());

        let empty = dir.path().join("empty.yml");
        fs::write(&empty, "").unwrap();
        assert!(Catalog::load(&empty).unwrap().list_approved(None, None).is_empty());
    }
}
