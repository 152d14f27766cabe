//! Line-oriented rendering of the stamp card.

use std::io::Write;

use stampcard_core::CollectionState;
use stampcard_core::ItemKey;
use stampcard_core::Notice;
use stampcard_core::Page;
use stampcard_core::Presenter;

/// Writes presenter events as plain text lines.
///
/// Item and affordance updates are kept rather than printed; commands
/// print the final card once with [`TerminalPresenter::print_card`].
pub struct TerminalPresenter<W: Write> {
    out: W,
    state: CollectionState,
    redeem_enabled: bool,
    page: Option<Page>,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: CollectionState::default(),
            redeem_enabled: false,
            page: None,
        }
    }

    pub fn page(&self) -> Option<Page> {
        self.page
    }

    pub fn redeem_enabled(&self) -> bool {
        self.redeem_enabled
    }

    pub fn line(&mut self, text: &str) {
        // Best effort: a closed stdout must not abort the command.
        let _ = writeln!(self.out, "{text}");
    }

    pub fn print_card(&mut self) {
        let visitor = self
            .state
            .visitor_id
            .as_ref()
            .map_or_else(|| "none".to_string(), ToString::to_string);
        self.line(&format!("visitor: {visitor}"));
        for item in ItemKey::ALL {
            let mark = if self.state.is_collected(item) { "x" } else { " " };
            self.line(&format!("  [{mark}] {item}"));
        }
        self.line(&format!("collected: {}/4", self.state.collected_count()));
        let reward = if self.state.redeemed {
            "redeemed"
        } else if self.redeem_enabled {
            "ready to redeem"
        } else {
            "locked"
        };
        self.line(&format!("reward: {reward}"));
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn show_page(&mut self, page: Page) {
        self.page = Some(page);
    }

    fn render_items(&mut self, state: &CollectionState) {
        self.state = state.clone();
    }

    fn set_redeem_enabled(&mut self, enabled: bool) {
        self.redeem_enabled = enabled;
    }

    fn item_collected(&mut self, item: ItemKey) {
        self.line(&format!("Collected {item}!"));
    }

    fn open_confirmation(&mut self) {
        self.line("All four items collected. Redeeming cannot be undone.");
    }

    fn close_confirmation(&mut self) {}

    fn show_notice(&mut self, notice: &Notice) {
        self.line(&notice.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn output(presenter: TerminalPresenter<Vec<u8>>) -> String {
        String::from_utf8(presenter.into_inner()).unwrap()
    }

    #[test]
    fn card_lists_every_item() {
        let mut presenter = TerminalPresenter::new(Vec::new());
        presenter.render_items(&CollectionState {
            visitor_id: Some("user_1abc".to_string().into()),
            items: [true, false, true, false],
            redeemed: false,
        });
        presenter.print_card();

        assert_eq!(
            output(presenter),
            "visitor: user_1abc\n  [x] item_1\n  [ ] item_2\n  [x] item_3\n  [ ] item_4\n\
             collected: 2/4\nreward: locked\n"
        );
    }

    #[test]
    fn only_cues_are_printed_immediately() {
        let mut presenter = TerminalPresenter::new(Vec::new());
        presenter.show_page(Page::Game);
        presenter.set_redeem_enabled(true);
        presenter.item_collected(ItemKey::Item3);
        assert_eq!(presenter.page(), Some(Page::Game));
        assert!(presenter.redeem_enabled());
        assert_eq!(output(presenter), "Collected item_3!\n");
    }

    #[test]
    fn notices_print_title_and_text() {
        let mut presenter = TerminalPresenter::new(Vec::new());
        presenter.show_notice(&Notice::camera("NotFoundError"));
        assert_eq!(output(presenter), "Camera error: No camera device was found.\n");
    }
}
