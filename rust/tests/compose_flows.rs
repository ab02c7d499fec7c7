use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use compose_core::{
    AccountDirectory, AccountSuggestion, AttachmentStatus, ComposeAction, ComposeMode,
    ComposerReconciler, ComposerState, ComposerUpdate, FfiComposer, MediaSource, MediaUploader,
    PlatformCapabilities, PostRef, UploadOutcome, Visibility,
};
use tempfile::tempdir;

fn write_config(data_dir: &str, v: serde_json::Value) {
    let path = std::path::Path::new(data_dir).join("compose_config.json");
    std::fs::write(path, serde_json::to_vec(&v).unwrap()).unwrap();
}

fn wait_until(what: &str, timeout: Duration, mut f: impl FnMut() -> bool) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("{what}: condition not met within {timeout:?}");
}

struct TestReconciler {
    updates: Arc<Mutex<Vec<ComposerUpdate>>>,
}

impl TestReconciler {
    fn new() -> (Self, Arc<Mutex<Vec<ComposerUpdate>>>) {
        let updates = Arc::new(Mutex::new(vec![]));
        (
            Self {
                updates: updates.clone(),
            },
            updates,
        )
    }
}

impl ComposerReconciler for TestReconciler {
    fn reconcile(&self, update: ComposerUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

/// Uploader whose `upload` blocks until the test releases an outcome.
#[derive(Clone)]
struct GatedUploader {
    release: flume::Sender<UploadOutcome>,
    gate: flume::Receiver<UploadOutcome>,
    started: Arc<Mutex<Vec<(String, String)>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
}

impl GatedUploader {
    fn new() -> Self {
        let (release, gate) = flume::unbounded();
        Self {
            release,
            gate,
            started: Arc::new(Mutex::new(vec![])),
            cancelled: Arc::new(Mutex::new(vec![])),
        }
    }

    fn finish(&self, outcome: UploadOutcome) {
        self.release.send(outcome).unwrap();
    }

    fn started(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl MediaUploader for GatedUploader {
    fn upload(&self, attachment_id: String, locator: String) -> UploadOutcome {
        self.started.lock().unwrap().push((attachment_id, locator));
        self.gate
            .recv()
            .unwrap_or_else(|_| UploadOutcome::failure("gate closed"))
    }

    fn cancel(&self, attachment_id: String) {
        self.cancelled.lock().unwrap().push(attachment_id);
        let _ = self.release.send(UploadOutcome::failure("aborted"));
    }
}

/// Directory that answers short prefixes slowly so a newer query can overtake them.
#[derive(Clone)]
struct SlowDirectory {
    accounts: Vec<AccountSuggestion>,
    slow_below_len: usize,
    delay: Duration,
    queries: Arc<Mutex<Vec<String>>>,
}

impl AccountDirectory for SlowDirectory {
    fn search(&self, prefix: String, limit: u32) -> Vec<AccountSuggestion> {
        self.queries.lock().unwrap().push(prefix.clone());
        if prefix.chars().count() < self.slow_below_len {
            std::thread::sleep(self.delay);
        }
        let needle = prefix.to_lowercase();
        self.accounts
            .iter()
            .filter(|a| a.handle.to_lowercase().contains(&needle))
            .take(limit as usize)
            .cloned()
            .collect()
    }
}

struct FixedCapabilities(Vec<MediaSource>);

impl PlatformCapabilities for FixedCapabilities {
    fn media_sources(&self) -> Vec<MediaSource> {
        self.0.clone()
    }
}

fn account(handle: &str, name: &str) -> AccountSuggestion {
    AccountSuggestion {
        id: format!("id-{handle}"),
        display_name: name.to_string(),
        handle: handle.to_string(),
    }
}

fn composer() -> (tempfile::TempDir, Arc<FfiComposer>) {
    let dir = tempdir().unwrap();
    let composer = FfiComposer::new(dir.path().to_string_lossy().to_string());
    (dir, composer)
}

fn root_id(composer: &FfiComposer) -> String {
    composer.state().root().unwrap().id.clone()
}

/// The uploader has the file and the snapshot shows the attachment.
fn wait_until_uploading(composer: &FfiComposer, uploader: &GatedUploader) {
    wait_until("upload started", Duration::from_secs(2), || {
        uploader.started() == 1
            && composer
                .state()
                .sessions
                .iter()
                .any(|s| !s.attachments.is_empty())
    });
}

fn root_body(state: &ComposerState) -> String {
    state.root().map(|s| s.body_text.clone()).unwrap_or_default()
}

#[test]
fn initial_state_is_available_immediately() {
    let (_dir, composer) = composer();
    let s = composer.state();
    assert_eq!(s.sessions.len(), 1);
    assert_eq!(s.focused_session_id, s.sessions[0].id);
    assert_eq!(s.max_characters, 500);
    assert_eq!(s.sessions[0].character_budget, 500);
    assert!(!s.can_submit);
    assert!(!s.can_add_follow_up);
    assert_eq!(s.media_sources, MediaSource::all());
}

#[test]
fn config_file_sets_limit_and_default_audience() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().to_string_lossy().to_string();
    write_config(
        &data_dir,
        serde_json::json!({
            "max_characters": 1000,
            "default_visibility": "unlisted",
            "default_language": "de",
        }),
    );
    let composer = FfiComposer::new(data_dir);
    let s = composer.state();
    assert_eq!(s.max_characters, 1000);
    let root = s.root().unwrap();
    assert_eq!(root.visibility, Visibility::Unlisted);
    assert_eq!(root.language_tag.as_deref(), Some("de"));
}

#[test]
fn typing_updates_counter_with_increasing_revs() {
    let (_dir, composer) = composer();
    let (reconciler, updates) = TestReconciler::new();
    composer.listen_for_updates(Box::new(reconciler));
    let root = root_id(&composer);

    composer.dispatch(ComposeAction::InsertText {
        session_id: root.clone(),
        text: "Hello 👋🏽".into(),
    });
    composer.dispatch(ComposeAction::ToggleContentWarning {
        session_id: root.clone(),
    });
    composer.dispatch(ComposeAction::SetContentWarningText {
        session_id: root,
        text: "cw".into(),
    });
    wait_until("cw applied", Duration::from_secs(2), || {
        composer
            .state()
            .root()
            .is_some_and(|r| r.content_warning_text == "cw")
    });

    let s = composer.state();
    let root = s.root().unwrap();
    // "Hello " + one emoji cluster + "cw"
    assert_eq!(root.visible_length, 9);
    assert_eq!(root.character_budget, 491);
    assert!(s.can_submit);
    assert!(s.can_add_follow_up);

    wait_until("three updates", Duration::from_secs(2), || {
        updates.lock().unwrap().len() >= 3
    });
    let up = updates.lock().unwrap();
    for w in up.windows(2) {
        assert_eq!(w[0].rev() + 1, w[1].rev());
    }
}

#[test]
fn upload_success_marks_attachment_uploaded() {
    let (_dir, composer) = composer();
    let uploader = GatedUploader::new();
    composer.set_media_uploader(Box::new(uploader.clone()));
    let root = root_id(&composer);

    composer.dispatch(ComposeAction::AddAttachment {
        session_id: root.clone(),
        source: MediaSource::PhotoLibrary,
        locator: "file:///cat.jpg".into(),
    });
    wait_until_uploading(&composer, &uploader);

    let s = composer.state();
    let attachment = &s.root().unwrap().attachments[0];
    assert_eq!(attachment.status, AttachmentStatus::Pending);
    assert_eq!(attachment.locator, "file:///cat.jpg");
    assert!(s.root().unwrap().is_submittable);
    // Posting waits until the media id is known.
    assert!(!s.can_submit);

    uploader.finish(UploadOutcome::success(
        "media-1",
        Some("https://cdn.example/cat.jpg".into()),
    ));
    wait_until("uploaded", Duration::from_secs(2), || {
        composer.state().root().unwrap().attachments[0].status == AttachmentStatus::Uploaded
    });
    let s = composer.state();
    let attachment = &s.root().unwrap().attachments[0];
    assert_eq!(attachment.remote_id.as_deref(), Some("media-1"));
    assert_eq!(attachment.url.as_deref(), Some("https://cdn.example/cat.jpg"));
    assert!(s.can_submit);
}

#[test]
fn submit_waits_for_pending_media() {
    let (_dir, composer) = composer();
    let (reconciler, updates) = TestReconciler::new();
    composer.listen_for_updates(Box::new(reconciler));
    let uploader = GatedUploader::new();
    composer.set_media_uploader(Box::new(uploader.clone()));
    let root = root_id(&composer);

    composer.dispatch(ComposeAction::InsertText {
        session_id: root.clone(),
        text: "sunset".into(),
    });
    composer.dispatch(ComposeAction::AddAttachment {
        session_id: root.clone(),
        source: MediaSource::PhotoLibrary,
        locator: "file:///sunset.jpg".into(),
    });
    wait_until_uploading(&composer, &uploader);

    composer.dispatch(ComposeAction::Submit);
    wait_until("submit refused", Duration::from_secs(2), || {
        composer.state().toast.as_deref() == Some("Media is still uploading")
    });
    let s = composer.state();
    assert_eq!(s.root().unwrap().id, root);
    assert_eq!(root_body(&s), "sunset");
    assert!(!updates
        .lock()
        .unwrap()
        .iter()
        .any(|u| matches!(u, ComposerUpdate::SubmissionReady { .. })));

    uploader.finish(UploadOutcome::success("media-1", None));
    wait_until("submittable", Duration::from_secs(2), || composer.state().can_submit);
    composer.dispatch(ComposeAction::Submit);
    wait_until("submission emitted", Duration::from_secs(2), || {
        updates
            .lock()
            .unwrap()
            .iter()
            .any(|u| matches!(u, ComposerUpdate::SubmissionReady { .. }))
    });

    let up = updates.lock().unwrap();
    let drafts = up
        .iter()
        .find_map(|u| match u {
            ComposerUpdate::SubmissionReady { drafts, .. } => Some(drafts.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].media.len(), 1);
    assert_eq!(drafts[0].media[0].status, AttachmentStatus::Uploaded);
    assert_eq!(drafts[0].media[0].remote_id.as_deref(), Some("media-1"));
}

#[test]
fn blank_poll_cannot_be_submitted() {
    let (_dir, composer) = composer();
    let root = root_id(&composer);
    composer.dispatch(ComposeAction::TogglePoll {
        session_id: root.clone(),
    });
    composer.dispatch(ComposeAction::Submit);
    wait_until("submit refused", Duration::from_secs(2), || {
        composer.state().toast.is_some()
    });
    let s = composer.state();
    assert!(!s.can_submit);
    assert_eq!(s.root().unwrap().id, root);
    assert!(s.root().unwrap().poll.is_some());
}

#[test]
fn cancel_upload_fails_attachment_and_blocks_submit() {
    let (_dir, composer) = composer();
    let uploader = GatedUploader::new();
    composer.set_media_uploader(Box::new(uploader.clone()));
    let root = root_id(&composer);

    composer.dispatch(ComposeAction::InsertText {
        session_id: root.clone(),
        text: "look".into(),
    });
    composer.dispatch(ComposeAction::AddAttachment {
        session_id: root.clone(),
        source: MediaSource::Camera,
        locator: "file:///shot.jpg".into(),
    });
    wait_until_uploading(&composer, &uploader);
    let attachment_id = composer.state().root().unwrap().attachments[0].id.clone();

    composer.dispatch(ComposeAction::CancelUpload {
        session_id: root.clone(),
        attachment_id: attachment_id.clone(),
    });
    wait_until("cancelled", Duration::from_secs(2), || {
        composer.state().root().unwrap().attachments[0]
            .status
            .is_failed()
    });
    assert_eq!(uploader.cancelled(), vec![attachment_id.clone()]);

    // A late result must not resurrect the attachment.
    std::thread::sleep(Duration::from_millis(100));
    let s = composer.state();
    assert_eq!(
        s.root().unwrap().attachments[0].status,
        AttachmentStatus::Failed {
            reason: "Upload cancelled".into()
        }
    );
    assert!(!s.can_submit);
    assert!(!s.root().unwrap().is_submittable);

    composer.dispatch(ComposeAction::Submit);
    wait_until("submit refused", Duration::from_secs(2), || {
        composer.state().toast.is_some()
    });

    composer.dispatch(ComposeAction::RemoveAttachment {
        session_id: root,
        attachment_id,
    });
    wait_until("removed", Duration::from_secs(2), || {
        composer.state().root().unwrap().attachments.is_empty()
    });
    assert!(composer.state().can_submit);
}

#[test]
fn failed_upload_records_reason() {
    let (_dir, composer) = composer();
    let uploader = GatedUploader::new();
    composer.set_media_uploader(Box::new(uploader.clone()));
    let root = root_id(&composer);

    composer.dispatch(ComposeAction::AddAttachment {
        session_id: root,
        source: MediaSource::Files,
        locator: "file:///big.mov".into(),
    });
    wait_until_uploading(&composer, &uploader);
    uploader.finish(UploadOutcome::failure("file too large"));

    wait_until("failed", Duration::from_secs(2), || {
        composer.state().root().unwrap().attachments[0].status
            == AttachmentStatus::Failed {
                reason: "file too large".into(),
            }
    });
}

#[test]
fn attachment_without_uploader_fails_immediately() {
    let (_dir, composer) = composer();
    let root = root_id(&composer);
    composer.dispatch(ComposeAction::AddAttachment {
        session_id: root,
        source: MediaSource::PhotoLibrary,
        locator: "file:///a.png".into(),
    });
    wait_until("attachment failed", Duration::from_secs(2), || {
        composer
            .state()
            .root()
            .is_some_and(|r| r.attachments.len() == 1 && r.attachments[0].status.is_failed())
    });
}

#[test]
fn poll_and_media_conflict_shows_toast() {
    let (_dir, composer) = composer();
    composer.set_media_uploader(Box::new(GatedUploader::new()));
    let root = root_id(&composer);

    composer.dispatch(ComposeAction::TogglePoll {
        session_id: root.clone(),
    });
    wait_until("poll shown", Duration::from_secs(2), || {
        composer.state().root().unwrap().poll.is_some()
    });
    let s = composer.state();
    let poll = s.root().unwrap().poll.clone().unwrap();
    assert_eq!(poll.options.len(), 2);
    assert_eq!(poll.duration_secs, 86_400);
    assert!(!poll.multiple);
    assert!(!s.root().unwrap().can_add_attachment);

    composer.dispatch(ComposeAction::AddAttachment {
        session_id: root.clone(),
        source: MediaSource::PhotoLibrary,
        locator: "file:///x.png".into(),
    });
    wait_until("toast", Duration::from_secs(2), || composer.state().toast.is_some());
    assert!(composer.state().root().unwrap().attachments.is_empty());

    composer.dispatch(ComposeAction::ClearToast);
    composer.dispatch(ComposeAction::SetPollDraft {
        session_id: root,
        options: vec!["only one".into()],
        duration_secs: 3600,
        multiple: true,
    });
    wait_until("invalid poll toast", Duration::from_secs(2), || {
        composer
            .state()
            .toast
            .is_some_and(|t| t.starts_with("Poll"))
    });
    // Rejected poll leaves the previous one in place.
    assert_eq!(
        composer.state().root().unwrap().poll.as_ref().unwrap().options.len(),
        2
    );
}

#[test]
fn follow_ups_cap_at_five_and_inherit_visibility() {
    let (_dir, composer) = composer();
    let root = root_id(&composer);
    composer.dispatch(ComposeAction::SetVisibility {
        session_id: root.clone(),
        visibility: Visibility::FollowersOnly,
    });
    for _ in 0..6 {
        composer.dispatch(ComposeAction::AddFollowUp);
    }
    wait_until("capacity toast", Duration::from_secs(2), || {
        composer.state().toast.is_some()
    });

    let s = composer.state();
    assert_eq!(s.sessions.len(), 6);
    assert_eq!(s.focused_session_id, s.sessions[5].id);
    for follow_up in &s.sessions[1..] {
        assert_eq!(follow_up.parent_id.as_deref(), Some(root.as_str()));
        assert_eq!(follow_up.visibility, Visibility::FollowersOnly);
    }
    assert!(!s.can_add_follow_up);

    let removed = s.sessions[5].id.clone();
    composer.dispatch(ComposeAction::RemoveFollowUp {
        session_id: removed,
    });
    // The root is not a follow-up; removing it is a no-op.
    composer.dispatch(ComposeAction::RemoveFollowUp {
        session_id: root.clone(),
    });
    wait_until("one removed", Duration::from_secs(2), || {
        composer.state().sessions.len() == 5
    });
    let s = composer.state();
    assert_eq!(s.focused_session_id, root);
    assert_eq!(s.sessions[0].id, root);
}

#[test]
fn submit_emits_thread_and_resets() {
    let (_dir, composer) = composer();
    let (reconciler, updates) = TestReconciler::new();
    composer.listen_for_updates(Box::new(reconciler));
    let root = root_id(&composer);

    composer.dispatch(ComposeAction::InsertText {
        session_id: root.clone(),
        text: "1/2".into(),
    });
    composer.dispatch(ComposeAction::AddFollowUp);
    wait_until("follow-up added", Duration::from_secs(2), || {
        composer.state().sessions.len() == 2
    });
    let follow_up = composer.state().sessions[1].id.clone();
    composer.dispatch(ComposeAction::InsertText {
        session_id: follow_up.clone(),
        text: "2/2".into(),
    });
    composer.dispatch(ComposeAction::Submit);

    wait_until("submission emitted", Duration::from_secs(2), || {
        updates
            .lock()
            .unwrap()
            .iter()
            .any(|u| matches!(u, ComposerUpdate::SubmissionReady { .. }))
    });
    wait_until("composer reset", Duration::from_secs(2), || {
        let s = composer.state();
        s.sessions.len() == 1 && s.sessions[0].id != root
    });

    let up = updates.lock().unwrap();
    let drafts = up
        .iter()
        .find_map(|u| match u {
            ComposerUpdate::SubmissionReady { drafts, .. } => Some(drafts.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(drafts.len(), 2);
    assert_eq!(drafts[0].text, "1/2");
    assert_eq!(drafts[0].session_id, root);
    assert!(drafts[0].in_reply_to_session_id.is_none());
    assert_eq!(drafts[1].text, "2/2");
    assert_eq!(drafts[1].in_reply_to_session_id.as_deref(), Some(root.as_str()));
    for w in up.windows(2) {
        assert_eq!(w[0].rev() + 1, w[1].rev());
    }
    assert!(root_body(&composer.state()).is_empty());
}

#[test]
fn over_limit_submit_is_refused_with_toast() {
    let (_dir, composer) = composer();
    let root = root_id(&composer);
    composer.dispatch(ComposeAction::SetMaxCharacters { max_characters: 5 });
    composer.dispatch(ComposeAction::InsertText {
        session_id: root.clone(),
        text: "too long".into(),
    });
    composer.dispatch(ComposeAction::Submit);
    wait_until("toast", Duration::from_secs(2), || composer.state().toast.is_some());

    let s = composer.state();
    assert_eq!(s.max_characters, 5);
    assert_eq!(s.root().unwrap().character_budget, -3);
    assert_eq!(root_body(&s), "too long");
    assert_eq!(s.root().unwrap().id, root);
}

#[test]
fn discard_cancels_running_uploads() {
    let (_dir, composer) = composer();
    let uploader = GatedUploader::new();
    composer.set_media_uploader(Box::new(uploader.clone()));
    let root = root_id(&composer);

    composer.dispatch(ComposeAction::AddAttachment {
        session_id: root.clone(),
        source: MediaSource::Gif,
        locator: "https://gifs.example/1".into(),
    });
    wait_until_uploading(&composer, &uploader);
    composer.dispatch(ComposeAction::Discard);
    wait_until("uploader told", Duration::from_secs(2), || {
        uploader.cancelled().len() == 1
    });
    let s = composer.state();
    assert_eq!(s.sessions.len(), 1);
    assert_ne!(s.sessions[0].id, root);
    assert!(s.sessions[0].attachments.is_empty());
}

#[test]
fn mention_lookup_drops_stale_results() {
    let (_dir, composer) = composer();
    let directory = SlowDirectory {
        accounts: vec![
            account("alice", "Alice"),
            account("albert", "Albert"),
            account("bob", "Bob"),
        ],
        slow_below_len: 2,
        delay: Duration::from_millis(300),
        queries: Arc::new(Mutex::new(vec![])),
    };
    composer.set_account_directory(Box::new(directory.clone()));
    let root = root_id(&composer);

    composer.dispatch(ComposeAction::InsertText {
        session_id: root.clone(),
        text: "hi @a".into(),
    });
    composer.dispatch(ComposeAction::InsertText {
        session_id: root.clone(),
        text: "li".into(),
    });

    wait_until("fresh suggestions", Duration::from_secs(2), || {
        composer.state().mention_suggestions.len() == 1
    });
    // Let the slow "a" lookup finish; it must not replace the "ali" results.
    std::thread::sleep(Duration::from_millis(400));
    let s = composer.state();
    assert_eq!(s.mention_suggestions.len(), 1);
    assert_eq!(s.mention_suggestions[0].handle, "alice");
    let autocomplete = s.root().unwrap().autocomplete.clone().unwrap();
    assert_eq!(autocomplete.query, "ali");

    composer.dispatch(ComposeAction::SelectAutocompleteSuggestion {
        session_id: root,
        value: "alice@example.social".into(),
    });
    wait_until("completed", Duration::from_secs(2), || {
        root_body(&composer.state()) == "hi @alice@example.social "
    });
    let s = composer.state();
    assert!(s.mention_suggestions.is_empty());
    assert!(s.root().unwrap().autocomplete.is_none());
}

#[test]
fn reply_prefills_author_and_narrows_audience() {
    let (_dir, composer) = composer();
    composer.dispatch(ComposeAction::Begin {
        mode: ComposeMode::Reply {
            target: PostRef {
                id: "109".into(),
                author_handle: "@carol@example.social".into(),
                visibility: Visibility::Unlisted,
            },
        },
    });
    wait_until("reply started", Duration::from_secs(2), || {
        root_body(&composer.state()) == "@carol@example.social "
    });
    let s = composer.state();
    let root = s.root().unwrap();
    assert_eq!(root.visibility, Visibility::Unlisted);
    assert_eq!(root.cursor, 22);
    assert!(matches!(root.mode, ComposeMode::Reply { .. }));
}

#[test]
fn platform_capabilities_restrict_media_sources() {
    let (_dir, composer) = composer();
    composer.set_media_uploader(Box::new(GatedUploader::new()));
    composer.set_platform_capabilities(Box::new(FixedCapabilities(vec![
        MediaSource::PhotoLibrary,
        MediaSource::Files,
    ])));
    wait_until("sources updated", Duration::from_secs(2), || {
        composer.state().media_sources.len() == 2
    });

    let root = root_id(&composer);
    composer.dispatch(ComposeAction::AddAttachment {
        session_id: root,
        source: MediaSource::Camera,
        locator: "camera://0".into(),
    });
    wait_until("toast", Duration::from_secs(2), || composer.state().toast.is_some());
    assert!(composer.state().root().unwrap().attachments.is_empty());
}

#[test]
fn unknown_draft_shows_toast() {
    let (_dir, composer) = composer();
    composer.dispatch(ComposeAction::InsertText {
        session_id: "nope".into(),
        text: "x".into(),
    });
    wait_until("toast", Duration::from_secs(2), || composer.state().toast.is_some());
    composer.dispatch(ComposeAction::ClearToast);
    wait_until("toast cleared", Duration::from_secs(2), || {
        composer.state().toast.is_none()
    });
    assert!(root_body(&composer.state()).is_empty());
}
