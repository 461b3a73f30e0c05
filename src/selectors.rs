//! Splits images into top-level selectors and pseudo-state variants.
//!
//! An image named `<base>-<state>` or `<base>_<state>`, where state is one
//! of `hover`, `target`, `active` or `focus`, is a variant of `<base>`. Such
//! variants are grouped under their base and never become selectors of
//! their own.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;

use crate::collect::ImageEntry;

static PSEUDO_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*[^-_])[-_](hover|target|active|focus)$").expect("pseudo name pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoState {
    Hover,
    Target,
    Active,
    Focus,
}

impl PseudoState {
    /// Every state, in the order they are emitted.
    pub const ALL: [PseudoState; 4] = [
        PseudoState::Hover,
        PseudoState::Target,
        PseudoState::Active,
        PseudoState::Focus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PseudoState::Hover => "hover",
            PseudoState::Target => "target",
            PseudoState::Active => "active",
            PseudoState::Focus => "focus",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.as_str() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl Display for PseudoState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variants of one base image, at most one per state.
#[derive(Debug, Default, Clone)]
pub struct PseudoGroup<'a>([Option<&'a ImageEntry>; 4]);

impl<'a> PseudoGroup<'a> {
    pub fn get(&self, state: PseudoState) -> Option<&'a ImageEntry> {
        self.0[state.index()]
    }

    /// Present variants in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (PseudoState, &'a ImageEntry)> + '_ {
        PseudoState::ALL
            .into_iter()
            .filter_map(|state| self.get(state).map(|image| (state, image)))
    }

    fn insert(&mut self, state: PseudoState, image: &'a ImageEntry) {
        self.0[state.index()] = Some(image);
    }
}

/// Result of [`partition`].
#[derive(Debug, Default)]
pub struct Selectors<'a> {
    /// Images that get their own selector, in input order.
    pub selectors: Vec<&'a ImageEntry>,
    /// Variants keyed by the logical name of their base image.
    pub pseudo: HashMap<&'a str, PseudoGroup<'a>>,
}

impl<'a> Selectors<'a> {
    pub fn states_of(&self, name: &str) -> impl Iterator<Item = (PseudoState, &'a ImageEntry)> + '_ {
        self.pseudo.get(name).into_iter().flat_map(|group| group.iter())
    }
}

/// Split `images` into selectors and pseudo-state groups in a single pass.
///
/// A variant whose base image doesn't exist is still grouped, and as a
/// result it is not rendered at all.
pub fn partition(images: &[ImageEntry]) -> Selectors<'_> {
    let mut out = Selectors::default();

    for image in images {
        let captures = PSEUDO_NAME.captures(&image.name);
        let variant = captures.and_then(|captures| {
            let base = captures.get(1)?.as_str();
            let state = PseudoState::parse(captures.get(2)?.as_str())?;
            Some((base, state))
        });

        match variant {
            Some((base, state)) => out.pseudo.entry(base).or_default().insert(state, image),
            None => out.selectors.push(image),
        }
    }

    out
}
