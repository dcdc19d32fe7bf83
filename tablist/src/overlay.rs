//! Per-viewer synthetic identity overlay.
//!
//! Each attached viewer is either `Hidden` (the client lists the real
//! participants) or `Shown` (the client lists exactly [`OVERLAY_SLOTS`]
//! synthetic entries whose names are slot labels). The manager owns the
//! bookkeeping for every viewer:
//! - which synthetic entries a viewer currently sees, by slot
//! - the layout whose text, latency and credentials those entries carry
//! - the packets needed to move a viewer between the two states
//!
//! Every pass holds the viewer's own lock from the first packet to the last,
//! so passes on one viewer never interleave while different viewers proceed
//! independently.

use crate::error::InvokeError;
use crate::host::{Host, Session, Value};
use crate::packets::{PacketSynthesizer, PassReport, TEXTURES_PROPERTY};
use log::{debug, info};
use shared::{encode_label, Credential, GameMode, Layout, LayoutEntry, PlayerInfoAction, OVERLAY_SLOTS};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Text of a slot with no layout content. Clients render an empty display
/// name as the profile name, so a single space is used instead.
pub const BLANK_TEXT: &str = " ";

/// Supplies the layout a viewer should currently see.
pub trait LayoutProvider: Send + Sync {
    fn layout_for(&self, viewer: &Session) -> Option<Layout>;
}

/// One synthetic identity visible to a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticEntry {
    pub slot: usize,
    /// Fresh random id per entry, never shared across slots or viewers.
    pub id: Uuid,
    pub label: String,
    pub ping: i32,
    pub text: String,
    pub credential: Option<Credential>,
}

impl SyntheticEntry {
    /// Creates the entry for `slot`, taking its content from `content` when
    /// a layout provides one.
    pub fn new(slot: usize, content: Option<&LayoutEntry>) -> Self {
        let mut entry = Self {
            slot,
            id: Uuid::new_v4(),
            label: encode_label(slot),
            ping: 0,
            text: BLANK_TEXT.to_string(),
            credential: None,
        };
        if let Some(content) = content {
            entry.apply_content(content);
        }
        entry
    }

    fn apply_content(&mut self, content: &LayoutEntry) {
        self.text = content.text.clone();
        self.ping = content.ping.max(0);
        self.credential = content.credential.clone();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Hidden,
    Shown,
}

/// Overlay bookkeeping for one viewer.
#[derive(Debug)]
struct ViewerOverlay {
    session: Session,
    entries: BTreeMap<usize, SyntheticEntry>,
    layout: Option<Layout>,
    /// Set once the viewer has left the table; no pass may show it again.
    detached: bool,
}

impl ViewerOverlay {
    fn new(session: Session) -> Self {
        Self {
            session,
            entries: BTreeMap::new(),
            layout: None,
            detached: false,
        }
    }

    fn state(&self) -> OverlayState {
        if self.entries.is_empty() {
            OverlayState::Hidden
        } else {
            OverlayState::Shown
        }
    }
}

/// Drives the overlay for every attached viewer.
///
/// Cloning is not needed: share it behind an `Arc` and call it from any task.
pub struct OverlayManager {
    host: Arc<dyn Host>,
    synth: Arc<PacketSynthesizer>,
    viewers: RwLock<HashMap<Uuid, Arc<Mutex<ViewerOverlay>>>>,
    layouts: Option<Arc<dyn LayoutProvider>>,
}

impl OverlayManager {
    pub fn new(host: Arc<dyn Host>, synth: Arc<PacketSynthesizer>) -> Self {
        Self {
            host,
            synth,
            viewers: RwLock::new(HashMap::new()),
            layouts: None,
        }
    }

    /// Uses `provider` for [`OverlayManager::refresh`].
    pub fn with_layout_provider(mut self, provider: Arc<dyn LayoutProvider>) -> Self {
        self.layouts = Some(provider);
        self
    }

    pub fn synthesizer(&self) -> &Arc<PacketSynthesizer> {
        &self.synth
    }

    /// Starts tracking `session` as a viewer, initially hidden.
    /// Returns false if it was already attached.
    pub async fn attach(&self, session: Session) -> bool {
        let mut viewers = self.viewers.write().await;
        if viewers.contains_key(&session.id) {
            return false;
        }
        debug!("Attached overlay for {}", session.name);
        viewers.insert(session.id, Arc::new(Mutex::new(ViewerOverlay::new(session))));
        true
    }

    /// Forgets the viewer, then hides its overlay if shown.
    ///
    /// The viewer leaves the table before the hide pass, so no show can
    /// start on it in between. A show that looked the viewer up earlier
    /// either finishes first and is undone here, or runs afterwards and
    /// fails with [`InvokeError::UnknownViewer`].
    pub async fn detach(&self, viewer: Uuid) -> Result<PassReport, InvokeError> {
        let overlay = self
            .viewers
            .write()
            .await
            .remove(&viewer)
            .ok_or(InvokeError::UnknownViewer(viewer))?;
        let mut overlay = overlay.lock().await;
        overlay.detached = true;
        let report = self.hide_overlay(&mut overlay);
        debug!("Detached overlay for {}", viewer);
        Ok(report)
    }

    pub async fn viewers(&self) -> Vec<Uuid> {
        self.viewers.read().await.keys().copied().collect()
    }

    async fn overlay(&self, viewer: Uuid) -> Result<Arc<Mutex<ViewerOverlay>>, InvokeError> {
        self.viewers
            .read()
            .await
            .get(&viewer)
            .cloned()
            .ok_or(InvokeError::UnknownViewer(viewer))
    }

    /// Only additions carry the credential; every other action identifies
    /// the entry by id alone.
    fn profile_for(&self, action: PlayerInfoAction, entry: &SyntheticEntry) -> Result<Value, InvokeError> {
        match (&entry.credential, action) {
            (Some(credential), PlayerInfoAction::AddPlayer) => self.synth.create_profile_with_property(
                entry.id,
                &entry.label,
                TEXTURES_PROPERTY,
                &credential.value,
                &credential.signature,
            ),
            _ => self.synth.create_profile(entry.id, &entry.label),
        }
    }

    fn entry_packet(&self, action: PlayerInfoAction, entry: &SyntheticEntry) -> Result<Value, InvokeError> {
        let profile = self.profile_for(action, entry)?;
        let record = self
            .synth
            .create_record(profile, entry.ping, GameMode::NotSet, &entry.text)?;
        self.synth.synthetic_packet(action, vec![record])
    }

    fn send_entry(
        &self,
        viewer: &Session,
        action: PlayerInfoAction,
        entry: &SyntheticEntry,
    ) -> Result<(), InvokeError> {
        let packet = self.entry_packet(action, entry)?;
        self.synth.send_to(viewer, &packet)
    }

    fn send_header_footer(&self, viewer: &Session, header: &str, footer: &str) -> Result<(), InvokeError> {
        match self.synth.header_footer_packet(header, footer)? {
            Some(packet) => self.synth.send_to(viewer, &packet),
            None => Ok(()),
        }
    }

    /// Shows the overlay, hiding every connected participant.
    pub async fn show(&self, viewer: Uuid) -> Result<PassReport, InvokeError> {
        self.show_filtered(viewer, |_| true).await
    }

    /// Shows the overlay to `viewer`.
    ///
    /// Every slot gets a fresh entry that is registered even when its packet
    /// fails, so a shown overlay always tracks all slots. Afterwards each
    /// connected participant accepted by `filter` is removed from the
    /// viewer's list. Showing an overlay that is already shown does nothing.
    pub async fn show_filtered<F>(&self, viewer: Uuid, filter: F) -> Result<PassReport, InvokeError>
    where
        F: Fn(&Session) -> bool,
    {
        let overlay = self.overlay(viewer).await?;
        let mut overlay = overlay.lock().await;
        if overlay.detached {
            return Err(InvokeError::UnknownViewer(viewer));
        }
        let mut report = PassReport::default();
        if overlay.state() == OverlayState::Shown {
            debug!("Overlay already shown to {}", overlay.session.name);
            return Ok(report);
        }

        let ViewerOverlay {
            session,
            entries,
            layout,
            ..
        } = &mut *overlay;

        for slot in 0..OVERLAY_SLOTS {
            let entry = SyntheticEntry::new(slot, layout.as_ref().and_then(|l| l.entry(slot)));
            report.record(self.send_entry(session, PlayerInfoAction::AddPlayer, &entry));
            entries.insert(slot, entry);
        }

        for participant in self.host.online_sessions().iter().filter(|s| filter(s)) {
            report.record(
                self.synth
                    .send_real(session, PlayerInfoAction::RemovePlayer, participant),
            );
        }

        if let Some(layout) = layout.as_ref() {
            if layout.header.is_some() || layout.footer.is_some() {
                report.record(self.send_header_footer(
                    session,
                    layout.header.as_deref().unwrap_or_default(),
                    layout.footer.as_deref().unwrap_or_default(),
                ));
            }
        }

        info!(
            "Overlay shown to {} ({} packets, {} failures)",
            session.name,
            report.sent,
            report.failures.len()
        );
        Ok(report)
    }

    /// Hides the overlay from `viewer` and restores every connected
    /// participant. Hiding an overlay that is already hidden does nothing.
    pub async fn hide(&self, viewer: Uuid) -> Result<PassReport, InvokeError> {
        let overlay = self.overlay(viewer).await?;
        let report = self.hide_overlay(&mut *overlay.lock().await);
        Ok(report)
    }

    fn hide_overlay(&self, overlay: &mut ViewerOverlay) -> PassReport {
        let mut report = PassReport::default();
        if overlay.state() == OverlayState::Hidden {
            debug!("Overlay already hidden from {}", overlay.session.name);
            return report;
        }

        let ViewerOverlay {
            session,
            entries,
            layout,
            ..
        } = overlay;

        for entry in entries.values() {
            report.record(self.send_entry(session, PlayerInfoAction::RemovePlayer, entry));
        }
        entries.clear();

        for participant in self.host.online_sessions() {
            report.record(
                self.synth
                    .send_real(session, PlayerInfoAction::AddPlayer, &participant),
            );
        }

        if let Some(layout) = layout.as_ref() {
            if layout.header.is_some() || layout.footer.is_some() {
                report.record(self.send_header_footer(session, "", ""));
            }
        }

        info!(
            "Overlay hidden from {} ({} packets, {} failures)",
            session.name,
            report.sent,
            report.failures.len()
        );
        report
    }

    pub async fn state(&self, viewer: Uuid) -> Result<OverlayState, InvokeError> {
        let overlay = self.overlay(viewer).await?;
        let state = overlay.lock().await.state();
        Ok(state)
    }

    pub async fn entry_count(&self, viewer: Uuid) -> Result<usize, InvokeError> {
        let overlay = self.overlay(viewer).await?;
        let count = overlay.lock().await.entries.len();
        Ok(count)
    }

    /// The entry `viewer` sees in `slot`; `None` while hidden.
    pub async fn lookup_by_slot(
        &self,
        viewer: Uuid,
        slot: usize,
    ) -> Result<Option<SyntheticEntry>, InvokeError> {
        let overlay = self.overlay(viewer).await?;
        let entry = overlay.lock().await.entries.get(&slot).cloned();
        Ok(entry)
    }

    /// Replaces the layout of `viewer`.
    ///
    /// While shown, visible entries are updated in place: display name and
    /// latency updates for changed text and ping, and a remove followed by a
    /// re-add for changed credentials since a profile cannot be edited on
    /// the client. A slot whose new profile cannot be built keeps its old
    /// entry. While hidden, the layout is only stored for the next show.
    pub async fn apply_layout(&self, viewer: Uuid, layout: Layout) -> Result<PassReport, InvokeError> {
        let overlay = self.overlay(viewer).await?;
        let mut overlay = overlay.lock().await;
        let mut report = PassReport::default();

        let ViewerOverlay {
            session,
            entries,
            layout: current,
            ..
        } = &mut *overlay;

        if !entries.is_empty() {
            let blank = LayoutEntry::new(BLANK_TEXT);
            for (slot, entry) in entries.iter_mut() {
                let content = layout.entry(*slot).unwrap_or(&blank);
                let mut next = entry.clone();
                next.apply_content(content);
                if next == *entry {
                    continue;
                }

                if next.credential != entry.credential {
                    // Build the replacement before removing anything, so a
                    // failed profile leaves the slot as it was
                    let add = match self.entry_packet(PlayerInfoAction::AddPlayer, &next) {
                        Ok(packet) => packet,
                        Err(e) => {
                            report.record(Err(e));
                            continue;
                        }
                    };
                    report.record(self.send_entry(session, PlayerInfoAction::RemovePlayer, entry));
                    report.record(self.synth.send_to(session, &add));
                } else {
                    if next.text != entry.text {
                        report.record(self.send_entry(session, PlayerInfoAction::UpdateDisplayName, &next));
                    }
                    if next.ping != entry.ping {
                        report.record(self.send_entry(session, PlayerInfoAction::UpdateLatency, &next));
                    }
                }
                *entry = next;
            }

            if layout.header.is_some() || layout.footer.is_some() {
                report.record(self.send_header_footer(
                    session,
                    layout.header.as_deref().unwrap_or_default(),
                    layout.footer.as_deref().unwrap_or_default(),
                ));
            }
            debug!("Applied layout to {} ({} packets)", session.name, report.sent);
        }

        *current = Some(layout);
        Ok(report)
    }

    /// Re-applies whatever the layout provider currently has for `viewer`.
    pub async fn refresh(&self, viewer: Uuid) -> Result<PassReport, InvokeError> {
        let Some(provider) = &self.layouts else {
            return Ok(PassReport::default());
        };
        let session = self.overlay(viewer).await?.lock().await.session.clone();
        match provider.layout_for(&session) {
            Some(layout) => self.apply_layout(viewer, layout).await,
            None => Ok(PassReport::default()),
        }
    }
}
