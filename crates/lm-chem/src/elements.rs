//! Periodic table subset used by the SMILES parser and property oracles.

/// Static element data.
#[derive(Debug, PartialEq)]
pub struct Element {
    pub symbol: &'static str,
    pub number: u8,
    /// Standard atomic weight in g/mol.
    pub mass: f64,
    /// Allowed valences, ascending. Empty for elements without a default
    /// valence model (metals); their bracket atoms are not valence-checked.
    pub valences: &'static [u8],
    /// May appear outside brackets.
    pub organic: bool,
    /// May be written in lowercase as an aromatic atom.
    pub aromatic: bool,
}

impl Element {
    pub fn max_valence(&self) -> Option<u8> {
        self.valences.last().copied()
    }

    pub fn is_halogen(&self) -> bool {
        matches!(self.number, 9 | 17 | 35 | 53)
    }

    pub fn is_hetero(&self) -> bool {
        !matches!(self.number, 1 | 6)
    }
}

pub const HYDROGEN_MASS: f64 = 1.008;

macro_rules! element {
    ($sym:literal, $num:literal, $mass:literal, [$($v:literal),*], $org:literal, $aro:literal) => {
        Element {
            symbol: $sym,
            number: $num,
            mass: $mass,
            valences: &[$($v),*],
            organic: $org,
            aromatic: $aro,
        }
    };
}

static ELEMENTS: &[Element] = &[
    element!("H", 1, 1.008, [1], false, false),
    element!("He", 2, 4.003, [], false, false),
    element!("Li", 3, 6.94, [], false, false),
    element!("B", 5, 10.81, [3], true, true),
    element!("C", 6, 12.011, [4], true, true),
    element!("N", 7, 14.007, [3, 5], true, true),
    element!("O", 8, 15.999, [2], true, true),
    element!("F", 9, 18.998, [1], true, false),
    element!("Na", 11, 22.99, [], false, false),
    element!("Mg", 12, 24.305, [], false, false),
    element!("Al", 13, 26.982, [], false, false),
    element!("Si", 14, 28.085, [4], false, false),
    element!("P", 15, 30.974, [3, 5], true, true),
    element!("S", 16, 32.067, [2, 4, 6], true, true),
    element!("Cl", 17, 35.453, [1], true, false),
    element!("K", 19, 39.098, [], false, false),
    element!("Ca", 20, 40.078, [], false, false),
    element!("Fe", 26, 55.845, [], false, false),
    element!("Cu", 29, 63.546, [], false, false),
    element!("Zn", 30, 65.38, [], false, false),
    element!("As", 33, 74.922, [3, 5], false, true),
    element!("Se", 34, 78.971, [2, 4, 6], false, true),
    element!("Br", 35, 79.904, [1], true, false),
    element!("Sn", 50, 118.71, [], false, false),
    element!("Te", 52, 127.6, [2, 4, 6], false, true),
    element!("I", 53, 126.904, [1], true, false),
    element!("Pt", 78, 195.084, [], false, false),
];

/// Look up an element by its capitalized symbol.
pub fn lookup(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.symbol == symbol)
}

/// Look up an element written as a lowercase aromatic symbol (`c`, `se`).
pub fn lookup_aromatic(symbol: &str) -> Option<&'static Element> {
    let mut chars = symbol.chars();
    let first = chars.next()?.to_ascii_uppercase();
    let capitalized: String = std::iter::once(first).chain(chars).collect();
    lookup(&capitalized).filter(|e| e.aromatic)
}
