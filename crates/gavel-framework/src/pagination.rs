//! Paginated inline menus and their callback grammar.
//!
//! Menus keep no server-side state: every button carries the action it
//! stands for, encoded as
//!
//! ```text
//! {prefix}_module({scope,}{key})
//! {prefix}_prev({scope,}{page})
//! {prefix}_next({scope,}{page})
//! {prefix}_back({scope})        // `{prefix}_back` when unscoped
//! ```
//!
//! `prev`/`next` carry the page the button was rendered on; the receiver
//! steps from there. [`MenuAction::parse`] is the exact inverse of
//! [`MenuAction::encode`], and both must stay stable across restarts since
//! old keyboards remain pressable.

use gavel_core::{ChatId, InlineButton, InlineKeyboard};

use crate::error::{PaginationError, PaginationResult};

/// Buttons per page, one per row.
pub const PAGE_SIZE: usize = 5;

/// Platform limit for callback payloads, in bytes.
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

const PREVIOUS_LABEL: &str = "Previous";
const NEXT_LABEL: &str = "Next";
const BACK_LABEL: &str = "Back";

/// One entry of a menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    /// Token embedded in callback data.
    pub key: String,
    /// Button label and sort key.
    pub label: String,
}

impl MenuItem {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

// =============================================================================
// MenuAction
// =============================================================================

/// A decoded menu button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    Module { scope: Option<ChatId>, key: String },
    Prev { scope: Option<ChatId>, page: usize },
    Next { scope: Option<ChatId>, page: usize },
    Back { scope: Option<ChatId> },
}

impl MenuAction {
    pub fn scope(&self) -> Option<ChatId> {
        match self {
            Self::Module { scope, .. }
            | Self::Prev { scope, .. }
            | Self::Next { scope, .. }
            | Self::Back { scope } => *scope,
        }
    }

    /// Renders the callback payload for this action.
    pub fn encode(&self, prefix: &str) -> String {
        fn args(scope: Option<ChatId>, token: &str) -> String {
            match scope {
                Some(scope) => format!("{scope},{token}"),
                None => token.to_string(),
            }
        }

        match self {
            Self::Module { scope, key } => format!("{prefix}_module({})", args(*scope, key)),
            Self::Prev { scope, page } => {
                format!("{prefix}_prev({})", args(*scope, &page.to_string()))
            }
            Self::Next { scope, page } => {
                format!("{prefix}_next({})", args(*scope, &page.to_string()))
            }
            Self::Back { scope: Some(scope) } => format!("{prefix}_back({scope})"),
            Self::Back { scope: None } => format!("{prefix}_back"),
        }
    }

    /// Parses a callback payload produced by [`encode`](Self::encode) with
    /// the same prefix.
    pub fn parse(data: &str, prefix: &str) -> PaginationResult<Self> {
        let unrecognized = || PaginationError::unrecognized(data);

        let rest = data
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
            .ok_or_else(unrecognized)?;

        let (verb, args): (&str, Vec<&str>) = match rest.split_once('(') {
            Some((verb, tail)) => {
                let inner = tail.strip_suffix(')').ok_or_else(unrecognized)?;
                if inner.contains(['(', ')']) {
                    return Err(unrecognized());
                }
                let args = if inner.is_empty() {
                    Vec::new()
                } else {
                    inner.split(',').collect()
                };
                (verb, args)
            }
            None => (rest, Vec::new()),
        };

        let scope = |token: &str| token.parse::<ChatId>().map_err(|_| unrecognized());
        let page = |token: &str| token.parse::<usize>().map_err(|_| unrecognized());
        let key = |token: &str| {
            let valid = !token.is_empty()
                && token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            valid.then(|| token.to_string()).ok_or_else(unrecognized)
        };

        match (verb, args.as_slice()) {
            ("module", [k]) => Ok(Self::Module {
                scope: None,
                key: key(k)?,
            }),
            ("module", [s, k]) => Ok(Self::Module {
                scope: Some(scope(s)?),
                key: key(k)?,
            }),
            ("prev", [p]) => Ok(Self::Prev {
                scope: None,
                page: page(p)?,
            }),
            ("prev", [s, p]) => Ok(Self::Prev {
                scope: Some(scope(s)?),
                page: page(p)?,
            }),
            ("next", [p]) => Ok(Self::Next {
                scope: None,
                page: page(p)?,
            }),
            ("next", [s, p]) => Ok(Self::Next {
                scope: Some(scope(s)?),
                page: page(p)?,
            }),
            ("back", []) => Ok(Self::Back { scope: None }),
            ("back", [s]) => Ok(Self::Back {
                scope: Some(scope(s)?),
            }),
            _ => Err(unrecognized()),
        }
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Number of pages needed for `len` items. Always at least one.
pub fn page_count(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1)).max(1)
}

/// Renders one page of `items` as an inline keyboard.
///
/// Items are sorted by label (then key) before slicing, so the output for a
/// given item set and page is always identical. Pages past the end are
/// clamped to the last page.
pub fn paginate(
    items: &[MenuItem],
    page_size: usize,
    page: usize,
    prefix: &str,
    scope: Option<ChatId>,
) -> PaginationResult<InlineKeyboard> {
    let page_size = page_size.max(1);
    let mut sorted: Vec<&MenuItem> = items.iter().collect();
    sorted.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.key.cmp(&b.key)));

    let pages = page_count(sorted.len(), page_size);
    let page = page.min(pages - 1);

    let mut keyboard = InlineKeyboard::new();
    for item in sorted.iter().skip(page * page_size).take(page_size) {
        let action = MenuAction::Module {
            scope,
            key: item.key.clone(),
        };
        keyboard = keyboard.row(vec![button(&item.label, &action, prefix)?]);
    }

    let mut navigation = Vec::new();
    if page > 0 {
        navigation.push(button(PREVIOUS_LABEL, &MenuAction::Prev { scope, page }, prefix)?);
    }
    if page + 1 < pages {
        navigation.push(button(NEXT_LABEL, &MenuAction::Next { scope, page }, prefix)?);
    }

    Ok(keyboard
        .row(navigation)
        .row(vec![back_button(prefix, scope)?]))
}

/// The standalone "Back" button shown under a module's detail text.
pub fn back_button(prefix: &str, scope: Option<ChatId>) -> PaginationResult<InlineButton> {
    button(BACK_LABEL, &MenuAction::Back { scope }, prefix)
}

fn button(label: &str, action: &MenuAction, prefix: &str) -> PaginationResult<InlineButton> {
    let data = action.encode(prefix);
    if data.len() > MAX_CALLBACK_DATA_LEN {
        return Err(PaginationError::CallbackTooLong {
            len: data.len(),
            data,
            max: MAX_CALLBACK_DATA_LEN,
        });
    }
    Ok(InlineButton::callback(label, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(names: &[&str]) -> Vec<MenuItem> {
        names
            .iter()
            .map(|name| MenuItem::new(name.to_lowercase(), *name))
            .collect()
    }

    fn twelve() -> Vec<MenuItem> {
        items(&[
            "Warns", "Admin", "Bans", "Locks", "Notes", "Rules", "AFK", "Filters", "Muting",
            "Purges", "Reporting", "Welcome",
        ])
    }

    fn callbacks(keyboard: &InlineKeyboard) -> Vec<String> {
        keyboard
            .buttons()
            .filter_map(|b| b.callback_data().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_first_page_layout() {
        let keyboard = paginate(&twelve(), PAGE_SIZE, 0, "help", None).unwrap();

        let labels: Vec<_> = keyboard.rows.iter().map(|row| row.len()).collect();
        assert_eq!(labels, [1, 1, 1, 1, 1, 1, 1]);
        assert_eq!(
            callbacks(&keyboard),
            [
                "help_module(afk)",
                "help_module(admin)",
                "help_module(bans)",
                "help_module(filters)",
                "help_module(locks)",
                "help_next(0)",
                "help_back",
            ]
        );
    }

    #[test]
    fn test_interior_page_shares_navigation_row() {
        let keyboard = paginate(&twelve(), PAGE_SIZE, 1, "stngs", Some(-100)).unwrap();
        let navigation = &keyboard.rows[5];

        assert_eq!(navigation.len(), 2);
        assert_eq!(navigation[0].callback_data(), Some("stngs_prev(-100,1)"));
        assert_eq!(navigation[1].callback_data(), Some("stngs_next(-100,1)"));
        assert_eq!(navigation[0].text, "Previous");
        assert_eq!(navigation[1].text, "Next");
        assert_eq!(
            keyboard.rows.last().unwrap()[0].callback_data(),
            Some("stngs_back(-100)")
        );
    }

    #[test]
    fn test_last_page_and_clamping() {
        let last = paginate(&twelve(), PAGE_SIZE, 2, "help", None).unwrap();
        let data = callbacks(&last);
        assert_eq!(data.len(), 4);
        assert_eq!(data[2], "help_prev(2)");

        let clamped = paginate(&twelve(), PAGE_SIZE, 99, "help", None).unwrap();
        assert_eq!(clamped, last);
    }

    #[test]
    fn test_empty_menu_has_only_back() {
        let keyboard = paginate(&[], PAGE_SIZE, 0, "stngs", Some(-5)).unwrap();
        assert_eq!(callbacks(&keyboard), ["stngs_back(-5)"]);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let mut shuffled = twelve();
        shuffled.reverse();
        for page in 0..3 {
            let a = paginate(&twelve(), PAGE_SIZE, page, "help", None).unwrap();
            let b = paginate(&shuffled, PAGE_SIZE, page, "help", None).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_every_button_parses_back_to_its_action() {
        for scope in [None, Some(-1001234567890)] {
            let prefix = if scope.is_some() { "stngs" } else { "help" };
            for page in 0..page_count(twelve().len(), PAGE_SIZE) {
                let keyboard = paginate(&twelve(), PAGE_SIZE, page, prefix, scope).unwrap();
                for data in callbacks(&keyboard) {
                    let action = MenuAction::parse(&data, prefix).unwrap();
                    assert_eq!(action.scope(), scope);
                    assert_eq!(action.encode(prefix), data);
                    if let MenuAction::Prev { page: p, .. } | MenuAction::Next { page: p, .. } =
                        action
                    {
                        assert_eq!(p, page);
                    }
                }
            }
        }
    }

    #[test]
    fn test_parse_accepts_legacy_back_forms() {
        assert_eq!(
            MenuAction::parse("help_back()", "help").unwrap(),
            MenuAction::Back { scope: None }
        );
        assert_eq!(
            MenuAction::parse("help_back", "help").unwrap(),
            MenuAction::Back { scope: None }
        );
    }

    #[test]
    fn test_parse_rejects_malformed_data() {
        for data in [
            "help_module()",
            "help_module(a,b,c)",
            "help_next(x)",
            "help_prev(-1)",
            "help_jump(1)",
            "help_module(rules",
            "help_module((rules))",
            "stngs_back(1)",
            "helpnext(1)",
            "help_module(-1,ru les)",
        ] {
            assert!(
                matches!(
                    MenuAction::parse(data, "help"),
                    Err(PaginationError::UnrecognizedCallback(_))
                ),
                "{data} should not parse"
            );
        }
    }

    #[test]
    fn test_oversized_callback_is_rejected() {
        let long = vec![MenuItem::new("k".repeat(60), "Long")];
        assert!(matches!(
            paginate(&long, PAGE_SIZE, 0, "stngs", Some(-1001234567890)),
            Err(PaginationError::CallbackTooLong { .. })
        ));
    }
}
