//! Collection and redemption protocol.
//!
//! [`StampCard`] ties the [`Session`], the [`QrTable`] and the host's
//! [`Presenter`] together. Every user action is a `&mut self` method, so
//! the host can only drive one action at a time.

use std::time::Instant;

use url::Url;

use crate::gesture::ResetGesture;
use crate::item::{ItemKey, QrTable};
use crate::notice::Notice;
use crate::session::{CollectionState, Session, Visitor, VisitorId};

/// Query parameter carrying the scanned QR payload.
pub const TOKEN_PARAM: &str = "token";

/// Screens the host can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Start,
    Game,
}

/// Rendering hooks implemented by the host.
pub trait Presenter {
    fn show_page(&mut self, page: Page);

    /// Redraws the four item slots.
    fn render_items(&mut self, state: &CollectionState);

    /// Enables or disables the redeem affordance.
    fn set_redeem_enabled(&mut self, enabled: bool);

    /// Cue for a fresh collection (sound, animation).
    fn item_collected(&mut self, item: ItemKey);

    fn open_confirmation(&mut self);

    fn close_confirmation(&mut self);

    /// Modal-style message the visitor must acknowledge.
    fn show_notice(&mut self, notice: &Notice);
}

/// The page address as the host sees it.
pub trait Location {
    fn current(&self) -> &Url;

    /// Replaces the address without navigating.
    fn replace(&mut self, url: Url);
}

/// In-memory [`Location`] that remembers how often it was rewritten.
#[derive(Debug, Clone)]
pub struct UrlLocation {
    url: Url,
    replacements: usize,
}

impl UrlLocation {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            replacements: 0,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn replacements(&self) -> usize {
        self.replacements
    }
}

impl Location for UrlLocation {
    fn current(&self) -> &Url {
        &self.url
    }

    fn replace(&mut self, url: Url) {
        self.url = url;
        self.replacements += 1;
    }
}

/// The `token` query value, if present.
pub fn token_param(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(name, _)| name == TOKEN_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// `url` without its `token` parameter. Other parameters and the fragment
/// are kept.
pub fn strip_token_param(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != TOKEN_PARAM)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The item flipped to collected.
    Collected(ItemKey),
    /// Valid token for an item already held.
    AlreadyCollected(ItemKey),
    /// Token not in the table.
    Unrecognized,
    /// The address carried no token.
    NoToken,
    /// No visitor identity yet.
    NoVisitor,
}

impl ScanOutcome {
    pub fn is_new_collection(self) -> bool {
        matches!(self, ScanOutcome::Collected(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemOutcome {
    Redeemed,
    /// The set stopped being redeemable while the confirmation was open,
    /// typically because another handle on the store redeemed it first.
    Rejected,
    /// The visitor identity changed while the confirmation was open.
    Invalidated,
    /// Confirm without an open confirmation.
    NotRequested,
}

pub struct StampCard<P: Presenter> {
    session: Session,
    table: QrTable,
    presenter: P,
    // Visitor that opened the confirmation, if one is open.
    pending_redeem: Option<VisitorId>,
    gesture: ResetGesture,
}

impl<P: Presenter> StampCard<P> {
    pub fn new(session: Session, table: QrTable, presenter: P) -> Self {
        Self {
            session,
            table,
            presenter,
            pending_redeem: None,
            gesture: ResetGesture::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> &CollectionState {
        self.session.state()
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn confirmation_open(&self) -> bool {
        self.pending_redeem.is_some()
    }

    /// App start. A returning visitor lands on the game page and any token
    /// in the address is processed; a new visitor sees the start page.
    pub fn boot(&mut self, location: &mut dyn Location) -> Visitor {
        let visitor = self.session.initialize_from_store();
        match &visitor {
            Visitor::Returning(_) => {
                self.presenter.show_page(Page::Game);
                self.refresh();
                self.handle_location(location);
            }
            Visitor::New => self.presenter.show_page(Page::Start),
        }
        visitor
    }

    /// The start button. Keeps an existing identity.
    pub fn start(&mut self, location: &mut dyn Location) -> ScanOutcome {
        if self.session.visitor_id().is_none() {
            self.session.create_identity();
        }
        self.presenter.show_page(Page::Game);
        self.refresh();
        self.handle_location(location)
    }

    /// Processes a scanned payload that did not arrive through the address.
    pub fn scan_token(&mut self, token: &str) -> ScanOutcome {
        let outcome = self.collect(token);
        if outcome.is_new_collection() {
            self.refresh();
        }
        outcome
    }

    /// Reads the `token` parameter. On a fresh collection the parameter is
    /// stripped from the address before the affordances are refreshed, so
    /// reloading the page does not replay the scan.
    pub fn handle_location(&mut self, location: &mut dyn Location) -> ScanOutcome {
        let Some(token) = token_param(location.current()) else {
            return ScanOutcome::NoToken;
        };
        let outcome = self.collect(&token);
        if outcome.is_new_collection() {
            let cleaned = strip_token_param(location.current());
            location.replace(cleaned);
            self.refresh();
        }
        outcome
    }

    fn collect(&mut self, token: &str) -> ScanOutcome {
        if self.session.visitor_id().is_none() {
            tracing::debug!("scan ignored: no visitor identity");
            return ScanOutcome::NoVisitor;
        }
        let Some(item) = self.table.lookup(token) else {
            tracing::debug!("unrecognized token scanned");
            return ScanOutcome::Unrecognized;
        };
        if !self.session.mark_collected(item) {
            return ScanOutcome::AlreadyCollected(item);
        }
        self.presenter.item_collected(item);
        ScanOutcome::Collected(item)
    }

    /// Opens the confirmation step. Returns false when the set is not
    /// redeemable.
    pub fn request_redeem(&mut self) -> bool {
        if !self.session.can_redeem() {
            return false;
        }
        let Some(visitor) = self.session.visitor_id().cloned() else {
            return false;
        };
        self.pending_redeem = Some(visitor);
        self.presenter.open_confirmation();
        true
    }

    pub fn confirm_redeem(&mut self) -> RedeemOutcome {
        let Some(opened_by) = self.pending_redeem.take() else {
            return RedeemOutcome::NotRequested;
        };

        let current = self.session.visitor_id();
        let stored = self.session.stored_visitor_id();
        if current != Some(&opened_by) || stored.as_ref() != Some(&opened_by) {
            tracing::warn!("visitor changed while redemption was pending");
            self.presenter.close_confirmation();
            self.refresh();
            return RedeemOutcome::Invalidated;
        }

        if self.session.sync_redeemed_from_store() {
            tracing::warn!("reward was redeemed elsewhere while confirming");
        }
        if !self.session.mark_redeemed() {
            self.presenter.close_confirmation();
            self.refresh();
            return RedeemOutcome::Rejected;
        }

        self.presenter.set_redeem_enabled(false);
        self.presenter.close_confirmation();
        self.presenter.render_items(self.session.state());
        RedeemOutcome::Redeemed
    }

    pub fn cancel_redeem(&mut self) {
        if self.pending_redeem.take().is_some() {
            self.presenter.close_confirmation();
        }
    }

    /// Clears everything and returns to the start page.
    pub fn reset(&mut self) {
        if self.pending_redeem.take().is_some() {
            self.presenter.close_confirmation();
        }
        self.session.reset();
        self.presenter.show_page(Page::Start);
        self.refresh();
    }

    /// Tap on the hidden reset control. Returns true when it reset.
    pub fn hidden_reset_tap(&mut self, now: Instant) -> bool {
        if !self.gesture.tap(now) {
            return false;
        }
        tracing::info!("hidden reset gesture completed");
        self.reset();
        true
    }

    /// The host's QR scanner could not start. `error_name` is the media
    /// error name reported by the capture API.
    pub fn scanner_failed(&mut self, error_name: &str) {
        tracing::warn!("scanner failed: {error_name}");
        self.presenter.show_notice(&Notice::camera(error_name));
    }

    /// Re-renders items and the redeem affordance from current state.
    pub fn refresh(&mut self) {
        self.presenter.render_items(self.session.state());
        self.presenter.set_redeem_enabled(self.session.can_redeem());
    }
}
