//! SMILES parsing, structural validation and writing.
//!
//! The parser builds a [`Molecule`] graph from a SMILES string and rejects
//! strings that do not describe a well-formed structure: unbalanced branches,
//! dangling bonds, unclosed or self-referencing ring closures, unknown
//! elements, aromatic atoms outside rings and organic-subset valence
//! violations. [`Molecule::to_smiles`] writes the graph back out in a
//! depth-first order with renumbered ring closures, which is the string form
//! used for candidate structures.

use std::collections::{HashMap, VecDeque};
use thiserror::Error;

use crate::elements::{self, Element};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmilesError {
    #[error("empty SMILES")]
    Empty,

    #[error("unexpected character {ch:?} at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },

    #[error("unknown element {symbol:?} at position {pos}")]
    UnknownElement { pos: usize, symbol: String },

    #[error("number at position {pos} is out of range")]
    InvalidNumber { pos: usize },

    #[error("unterminated bracket atom starting at position {pos}")]
    UnterminatedBracket { pos: usize },

    #[error("unbalanced branch at position {pos}")]
    UnbalancedBranch { pos: usize },

    #[error("bond at position {pos} has nothing to attach to")]
    DanglingBond { pos: usize },

    #[error("ring closure {label} is never closed")]
    UnclosedRing { label: u16 },

    #[error("ring closure {label} bonds an atom to itself")]
    RingSelfBond { label: u16 },

    #[error("ring closure {label} duplicates an existing bond")]
    DuplicateBond { label: u16 },

    #[error("ring closure {label} has conflicting bond orders")]
    ConflictingRingBond { label: u16 },

    #[error("atom {atom} ({symbol}) has valence {valence}, allowed at most {allowed}")]
    Valence {
        atom: usize,
        symbol: String,
        valence: u32,
        allowed: u32,
    },

    #[error("aromatic atom {atom} is not in a ring")]
    AromaticOutsideRing { atom: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chirality {
    None,
    Anticlockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    /// Contribution to the valence of each endpoint.
    pub fn valence(&self) -> u8 {
        match self {
            Self::Single | Self::Aromatic => 1,
            Self::Double => 2,
            Self::Triple => 3,
            Self::Quadruple => 4,
        }
    }
}

/// Directional single bond marker (`/` or `\`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondStereo {
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct Atom {
    pub element: &'static Element,
    pub aromatic: bool,
    pub bracket: bool,
    pub isotope: Option<u16>,
    pub chirality: Chirality,
    /// Hydrogens written inside a bracket atom.
    pub explicit_h: u8,
    /// Hydrogens implied by the default valence. Always zero for bracket atoms.
    pub implicit_h: u8,
    pub charge: i8,
    pub class: Option<u16>,
}

impl Atom {
    fn organic(element: &'static Element, aromatic: bool) -> Self {
        Self {
            element,
            aromatic,
            bracket: false,
            isotope: None,
            chirality: Chirality::None,
            explicit_h: 0,
            implicit_h: 0,
            charge: 0,
            class: None,
        }
    }

    pub fn total_h(&self) -> u8 {
        self.explicit_h + self.implicit_h
    }

    pub fn is_chiral(&self) -> bool {
        self.chirality != Chirality::None
    }

    fn write(&self, out: &mut String) {
        let symbol = if self.aromatic {
            self.element.symbol.to_ascii_lowercase()
        } else {
            self.element.symbol.to_string()
        };
        if !self.bracket {
            out.push_str(&symbol);
            return;
        }
        out.push('[');
        if let Some(isotope) = self.isotope {
            out.push_str(&isotope.to_string());
        }
        out.push_str(&symbol);
        match self.chirality {
            Chirality::None => {}
            Chirality::Anticlockwise => out.push('@'),
            Chirality::Clockwise => out.push_str("@@"),
        }
        match self.explicit_h {
            0 => {}
            1 => out.push('H'),
            n => {
                out.push('H');
                out.push_str(&n.to_string());
            }
        }
        match self.charge {
            0 => {}
            1 => out.push('+'),
            -1 => out.push('-'),
            c if c > 0 => {
                out.push('+');
                out.push_str(&c.to_string());
            }
            c => {
                out.push('-');
                out.push_str(&c.unsigned_abs().to_string());
            }
        }
        if let Some(class) = self.class {
            out.push(':');
            out.push_str(&class.to_string());
        }
        out.push(']');
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
    pub stereo: Option<BondStereo>,
}

impl Bond {
    pub fn other(&self, atom: usize) -> usize {
        if self.a == atom {
            self.b
        } else {
            self.a
        }
    }
}

/// A parsed molecular graph.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    /// Indices into `bonds` of the bonds written as ring closures.
    pub ring_closures: Vec<usize>,
}

impl Molecule {
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.element.number != 1).count()
    }

    pub fn hydrogen_count(&self) -> usize {
        self.atoms
            .iter()
            .map(|a| a.total_h() as usize + usize::from(a.element.number == 1))
            .sum()
    }

    /// `(neighbor, bond index)` pairs for every atom, neighbors ascending.
    pub fn adjacency(&self) -> Vec<Vec<(usize, usize)>> {
        let mut adj = vec![Vec::new(); self.atoms.len()];
        for (i, bond) in self.bonds.iter().enumerate() {
            adj[bond.a].push((bond.b, i));
            adj[bond.b].push((bond.a, i));
        }
        for list in &mut adj {
            list.sort_unstable();
        }
        adj
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.bonds
            .iter()
            .filter(|b| b.a == atom || b.b == atom)
            .count()
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&Bond> {
        self.bonds
            .iter()
            .find(|bond| (bond.a == a && bond.b == b) || (bond.a == b && bond.b == a))
    }

    /// Summed bond orders per atom, indexed like `atoms`.
    fn bond_valences(&self) -> Vec<u32> {
        let mut valences = vec![0u32; self.atoms.len()];
        for bond in &self.bonds {
            let order = u32::from(bond.order.valence());
            valences[bond.a] += order;
            valences[bond.b] += order;
        }
        valences
    }

    /// One ring per ring-closure bond: the shortest path between the closure
    /// endpoints that avoids the closure bond itself.
    pub fn rings(&self) -> Vec<Vec<usize>> {
        let adj = self.adjacency();
        self.ring_closures
            .iter()
            .filter_map(|&closure| {
                let bond = &self.bonds[closure];
                shortest_path(&adj, bond.a, bond.b, closure)
            })
            .collect()
    }

    /// True when removing the bond keeps its endpoints connected.
    pub fn is_ring_bond(&self, bond: usize) -> bool {
        let adj = self.adjacency();
        let b = &self.bonds[bond];
        shortest_path(&adj, b.a, b.b, bond).is_some()
    }

    /// Per-bond ring membership, indexed like `bonds`. A bond is in a ring
    /// exactly when it is not a bridge of the graph.
    pub fn ring_bonds(&self) -> Vec<bool> {
        let adj = self.adjacency();
        let n = self.atoms.len();
        let mut order = vec![usize::MAX; n];
        let mut low = vec![0usize; n];
        let mut in_ring = vec![true; self.bonds.len()];
        let mut counter = 0usize;

        for start in 0..n {
            if order[start] != usize::MAX {
                continue;
            }
            order[start] = counter;
            low[start] = counter;
            counter += 1;
            // (atom, bond it was entered through, adjacency cursor)
            let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(start, None, 0)];
            while let Some(top) = stack.last_mut() {
                let (atom, entered_by, cursor) = *top;
                if let Some(&(next, bond)) = adj[atom].get(cursor) {
                    top.2 += 1;
                    if Some(bond) == entered_by {
                        continue;
                    }
                    if order[next] == usize::MAX {
                        order[next] = counter;
                        low[next] = counter;
                        counter += 1;
                        stack.push((next, Some(bond), 0));
                    } else {
                        low[atom] = low[atom].min(order[next]);
                    }
                    continue;
                }
                stack.pop();
                if let (Some(bond), Some(&(parent, _, _))) = (entered_by, stack.last()) {
                    low[parent] = low[parent].min(low[atom]);
                    if low[atom] > order[parent] {
                        in_ring[bond] = false;
                    }
                }
            }
        }
        in_ring
    }

    /// Per-atom ring membership: an atom is in a ring when one of its bonds is.
    pub fn ring_atoms(&self) -> Vec<bool> {
        let mut in_ring = vec![false; self.atoms.len()];
        for (bond, ring) in self.bonds.iter().zip(self.ring_bonds()) {
            if ring {
                in_ring[bond.a] = true;
                in_ring[bond.b] = true;
            }
        }
        in_ring
    }

    /// Write the molecule as SMILES, depth first from the lowest atom index
    /// of each component, ring closures numbered from 1 with reuse.
    pub fn to_smiles(&self) -> String {
        let n = self.atoms.len();
        let adj = self.adjacency();
        let mut visited = vec![false; n];
        let mut bond_seen = vec![false; self.bonds.len()];
        let mut children: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
        let mut closures: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut roots = Vec::new();
        let mut rank = vec![0usize; n];
        let mut next_rank = 0usize;

        for start in 0..n {
            if visited[start] {
                continue;
            }
            roots.push(start);
            // Iterative DFS keeping the preorder the emitter relies on.
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            visited[start] = true;
            rank[start] = next_rank;
            next_rank += 1;
            while let Some(top) = stack.last_mut() {
                let (atom, cursor) = *top;
                if cursor >= adj[atom].len() {
                    stack.pop();
                    continue;
                }
                top.1 += 1;
                let (next, bond) = adj[atom][cursor];
                if bond_seen[bond] {
                    continue;
                }
                bond_seen[bond] = true;
                if visited[next] {
                    closures[next].push(bond);
                    closures[atom].push(bond);
                } else {
                    visited[next] = true;
                    rank[next] = next_rank;
                    next_rank += 1;
                    children[atom].push((next, bond));
                    stack.push((next, 0));
                }
            }
        }

        // Closures at an atom are written in output order of their partners
        // so that rewriting the output reproduces it exactly.
        for (atom, list) in closures.iter_mut().enumerate() {
            list.sort_by_key(|&bond| rank[self.bonds[bond].other(atom)]);
        }

        let mut writer = SmilesWriter {
            mol: self,
            children: &children,
            closures: &closures,
            open: HashMap::new(),
            in_use: Vec::new(),
            out: String::new(),
        };
        for (i, &root) in roots.iter().enumerate() {
            if i > 0 {
                writer.out.push('.');
            }
            writer.write_component(root);
        }
        writer.out
    }
}

fn shortest_path(
    adj: &[Vec<(usize, usize)>],
    from: usize,
    to: usize,
    skip_bond: usize,
) -> Option<Vec<usize>> {
    let mut parent: Vec<Option<usize>> = vec![None; adj.len()];
    let mut seen = vec![false; adj.len()];
    let mut queue = VecDeque::from([from]);
    seen[from] = true;
    while let Some(atom) = queue.pop_front() {
        if atom == to {
            let mut path = vec![to];
            let mut cur = to;
            while let Some(p) = parent[cur] {
                path.push(p);
                cur = p;
            }
            path.reverse();
            return Some(path);
        }
        for &(next, bond) in &adj[atom] {
            if bond != skip_bond && !seen[next] {
                seen[next] = true;
                parent[next] = Some(atom);
                queue.push_back(next);
            }
        }
    }
    None
}

struct SmilesWriter<'a> {
    mol: &'a Molecule,
    children: &'a [Vec<(usize, usize)>],
    closures: &'a [Vec<usize>],
    /// Ring bond -> digit currently assigned to it.
    open: HashMap<usize, u16>,
    in_use: Vec<u16>,
    out: String,
}

/// Pending writer work, kept on an explicit stack so that chain length does
/// not translate into call depth.
enum WriteStep {
    Atom {
        atom: usize,
        bond: Option<usize>,
        branch: bool,
    },
    CloseBranch,
}

impl SmilesWriter<'_> {
    fn write_component(&mut self, root: usize) {
        let mut steps = vec![WriteStep::Atom {
            atom: root,
            bond: None,
            branch: false,
        }];
        while let Some(step) = steps.pop() {
            match step {
                WriteStep::CloseBranch => self.out.push(')'),
                WriteStep::Atom { atom, bond, branch } => {
                    if branch {
                        self.out.push('(');
                    }
                    if let Some(bond) = bond {
                        self.push_bond(bond);
                    }
                    self.write_atom(atom);
                    let children = &self.children[atom];
                    // Reversed so the first child is written first; every
                    // child but the last is a parenthesized branch.
                    for (i, &(child, bond)) in children.iter().enumerate().rev() {
                        let branch = i + 1 < children.len();
                        if branch {
                            steps.push(WriteStep::CloseBranch);
                        }
                        steps.push(WriteStep::Atom {
                            atom: child,
                            bond: Some(bond),
                            branch,
                        });
                    }
                }
            }
        }
    }

    /// The atom itself followed by its ring closure labels.
    fn write_atom(&mut self, atom: usize) {
        self.mol.atoms[atom].write(&mut self.out);

        let closures = self.closures;
        for &bond in &closures[atom] {
            if let Some(digit) = self.open.remove(&bond) {
                self.in_use.retain(|d| *d != digit);
                self.push_label(digit);
            } else {
                let digit = (1..).find(|d| !self.in_use.contains(d)).unwrap_or(1);
                self.in_use.push(digit);
                self.open.insert(bond, digit);
                self.push_bond(bond);
                self.push_label(digit);
            }
        }
    }

    fn push_label(&mut self, digit: u16) {
        if digit < 10 {
            self.out.push_str(&digit.to_string());
        } else {
            self.out.push('%');
            self.out.push_str(&digit.to_string());
        }
    }

    fn push_bond(&mut self, bond: usize) {
        let bond = &self.mol.bonds[bond];
        let both_aromatic = self.mol.atoms[bond.a].aromatic && self.mol.atoms[bond.b].aromatic;
        let symbol = match (bond.order, bond.stereo) {
            (BondOrder::Single, Some(BondStereo::Up)) => "/",
            (BondOrder::Single, Some(BondStereo::Down)) => "\\",
            (BondOrder::Single, None) if both_aromatic => "-",
            (BondOrder::Single, None) => "",
            (BondOrder::Double, _) => "=",
            (BondOrder::Triple, _) => "#",
            (BondOrder::Quadruple, _) => "$",
            (BondOrder::Aromatic, _) if both_aromatic => "",
            (BondOrder::Aromatic, _) => ":",
        };
        self.out.push_str(symbol);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingBond {
    order: BondOrder,
    stereo: Option<BondStereo>,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    mol: Molecule,
    prev: Option<usize>,
    branches: Vec<usize>,
    pending: Option<PendingBond>,
    rings: HashMap<u16, (usize, Option<PendingBond>)>,
}

/// Parse and validate a SMILES string.
pub fn parse(smiles: &str) -> Result<Molecule, SmilesError> {
    let smiles = smiles.trim();
    if smiles.is_empty() {
        return Err(SmilesError::Empty);
    }
    let mut parser = Parser {
        chars: smiles.chars().collect(),
        pos: 0,
        mol: Molecule::default(),
        prev: None,
        branches: Vec::new(),
        pending: None,
        rings: HashMap::new(),
    };
    parser.run()?;
    let mut mol = parser.mol;
    assign_hydrogens(&mut mol)?;
    check_aromatic_rings(&mol)?;
    Ok(mol)
}

impl Parser {
    fn run(&mut self) -> Result<(), SmilesError> {
        while self.pos < self.chars.len() {
            let pos = self.pos;
            let ch = self.chars[pos];
            match ch {
                '(' => {
                    let Some(prev) = self.prev else {
                        return Err(SmilesError::UnbalancedBranch { pos });
                    };
                    if self.pending.is_some() {
                        return Err(SmilesError::DanglingBond { pos });
                    }
                    self.branches.push(prev);
                    self.pos += 1;
                }
                ')' => {
                    if self.pending.is_some() {
                        return Err(SmilesError::DanglingBond { pos });
                    }
                    let Some(atom) = self.branches.pop() else {
                        return Err(SmilesError::UnbalancedBranch { pos });
                    };
                    self.prev = Some(atom);
                    self.pos += 1;
                }
                '-' | '=' | '#' | '$' | ':' | '/' | '\\' => {
                    if self.pending.is_some() || self.prev.is_none() {
                        return Err(SmilesError::DanglingBond { pos });
                    }
                    let (order, stereo) = match ch {
                        '=' => (BondOrder::Double, None),
                        '#' => (BondOrder::Triple, None),
                        '$' => (BondOrder::Quadruple, None),
                        ':' => (BondOrder::Aromatic, None),
                        '/' => (BondOrder::Single, Some(BondStereo::Up)),
                        '\\' => (BondOrder::Single, Some(BondStereo::Down)),
                        _ => (BondOrder::Single, None),
                    };
                    self.pending = Some(PendingBond { order, stereo });
                    self.pos += 1;
                }
                '.' => {
                    if self.pending.is_some() || self.prev.is_none() {
                        return Err(SmilesError::DanglingBond { pos });
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                '0'..='9' => {
                    self.pos += 1;
                    self.ring_closure(ch as u16 - '0' as u16, pos)?;
                }
                '%' => {
                    let digits: String = self.chars[pos + 1..]
                        .iter()
                        .take(2)
                        .take_while(|c| c.is_ascii_digit())
                        .collect();
                    if digits.len() != 2 {
                        return Err(SmilesError::UnexpectedChar { pos, ch });
                    }
                    self.pos += 3;
                    let label = digits
                        .parse::<u16>()
                        .map_err(|_| SmilesError::UnexpectedChar { pos, ch })?;
                    self.ring_closure(label, pos)?;
                }
                '[' => {
                    let atom = self.bracket_atom()?;
                    self.add_atom(atom);
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.add_atom(atom);
                }
            }
        }

        if self.pending.is_some() {
            return Err(SmilesError::DanglingBond {
                pos: self.chars.len(),
            });
        }
        if !self.branches.is_empty() {
            return Err(SmilesError::UnbalancedBranch {
                pos: self.chars.len(),
            });
        }
        if let Some(label) = self.rings.keys().min() {
            return Err(SmilesError::UnclosedRing { label: *label });
        }
        if self.mol.atoms.is_empty() {
            return Err(SmilesError::Empty);
        }
        Ok(())
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {
        if self.mol.atoms[a].aromatic && self.mol.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn add_atom(&mut self, atom: Atom) {
        let idx = self.mol.atoms.len();
        self.mol.atoms.push(atom);
        if let Some(prev) = self.prev {
            let bond = self.pending.take().unwrap_or(PendingBond {
                order: self.default_order(prev, idx),
                stereo: None,
            });
            self.mol.bonds.push(Bond {
                a: prev,
                b: idx,
                order: bond.order,
                stereo: bond.stereo,
            });
        }
        self.prev = Some(idx);
    }

    fn ring_closure(&mut self, label: u16, pos: usize) -> Result<(), SmilesError> {
        let Some(current) = self.prev else {
            return Err(SmilesError::DanglingBond { pos });
        };
        let pending = self.pending.take();
        let Some((opener, opening_bond)) = self.rings.remove(&label) else {
            self.rings.insert(label, (current, pending));
            return Ok(());
        };
        if opener == current {
            return Err(SmilesError::RingSelfBond { label });
        }
        if self.mol.bond_between(opener, current).is_some() {
            return Err(SmilesError::DuplicateBond { label });
        }
        let bond = match (opening_bond, pending) {
            (Some(a), Some(b)) if a.order != b.order => {
                return Err(SmilesError::ConflictingRingBond { label })
            }
            (Some(a), _) | (None, Some(a)) => a,
            (None, None) => PendingBond {
                order: self.default_order(opener, current),
                stereo: None,
            },
        };
        self.mol.ring_closures.push(self.mol.bonds.len());
        self.mol.bonds.push(Bond {
            a: opener,
            b: current,
            order: bond.order,
            stereo: bond.stereo,
        });
        Ok(())
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn organic_atom(&mut self) -> Result<Atom, SmilesError> {
        let pos = self.pos;
        let ch = self.chars[pos];
        let (symbol, aromatic, len): (&str, bool, usize) = match (ch, self.peek(1)) {
            ('C', Some('l')) => ("Cl", false, 2),
            ('B', Some('r')) => ("Br", false, 2),
            ('B', _) => ("B", false, 1),
            ('C', _) => ("C", false, 1),
            ('N', _) => ("N", false, 1),
            ('O', _) => ("O", false, 1),
            ('P', _) => ("P", false, 1),
            ('S', _) => ("S", false, 1),
            ('F', _) => ("F", false, 1),
            ('I', _) => ("I", false, 1),
            ('b', _) => ("B", true, 1),
            ('c', _) => ("C", true, 1),
            ('n', _) => ("N", true, 1),
            ('o', _) => ("O", true, 1),
            ('p', _) => ("P", true, 1),
            ('s', _) => ("S", true, 1),
            _ => return Err(SmilesError::UnexpectedChar { pos, ch }),
        };
        self.pos += len;
        let element = elements::lookup(symbol)
            .filter(|e| e.organic && (!aromatic || e.aromatic))
            .ok_or_else(|| SmilesError::UnknownElement {
                pos,
                symbol: symbol.to_string(),
            })?;
        Ok(Atom::organic(element, aromatic))
    }

    fn chars_str(&self, start: usize, len: usize) -> String {
        self.chars[start..start + len].iter().collect()
    }

    /// An optional unsigned number. Digits that do not fit `u16` are an
    /// error rather than an absent number.
    fn read_number(&mut self) -> Result<Option<u16>, SmilesError> {
        let start = self.pos;
        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Ok(None);
        }
        self.chars_str(start, self.pos - start)
            .parse()
            .map(Some)
            .map_err(|_| SmilesError::InvalidNumber { pos: start })
    }

    fn bracket_atom(&mut self) -> Result<Atom, SmilesError> {
        let open = self.pos;
        self.pos += 1;
        let unterminated = SmilesError::UnterminatedBracket { pos: open };

        let isotope = self.read_number()?;

        let first = self.peek(0).ok_or_else(|| unterminated.clone())?;
        let second = self.peek(1);
        let (element, aromatic, len) = if first.is_ascii_lowercase() {
            let two = second
                .filter(|c| c.is_ascii_lowercase())
                .and_then(|c| elements::lookup_aromatic(&format!("{first}{c}")));
            match two {
                Some(e) => (e, true, 2),
                None => {
                    let e = elements::lookup_aromatic(&first.to_string()).ok_or_else(|| {
                        SmilesError::UnknownElement {
                            pos: self.pos,
                            symbol: first.to_string(),
                        }
                    })?;
                    (e, true, 1)
                }
            }
        } else if first.is_ascii_uppercase() {
            let two = second
                .filter(|c| c.is_ascii_lowercase())
                .and_then(|c| elements::lookup(&format!("{first}{c}")));
            match two {
                Some(e) => (e, false, 2),
                None => {
                    let e = elements::lookup(&first.to_string()).ok_or_else(|| {
                        SmilesError::UnknownElement {
                            pos: self.pos,
                            symbol: first.to_string(),
                        }
                    })?;
                    (e, false, 1)
                }
            }
        } else {
            return Err(SmilesError::UnexpectedChar {
                pos: self.pos,
                ch: first,
            });
        };
        self.pos += len;

        let mut chirality = Chirality::None;
        if self.peek(0) == Some('@') {
            self.pos += 1;
            chirality = Chirality::Anticlockwise;
            if self.peek(0) == Some('@') {
                self.pos += 1;
                chirality = Chirality::Clockwise;
            }
        }

        let mut explicit_h = 0u8;
        if self.peek(0) == Some('H') {
            self.pos += 1;
            explicit_h = match self.read_number()? {
                Some(n) => u8::try_from(n).map_err(|_| unterminated.clone())?,
                None => 1,
            };
        }

        let mut charge: i8 = 0;
        if let Some(sign @ ('+' | '-')) = self.peek(0) {
            self.pos += 1;
            let unit: i8 = if sign == '+' { 1 } else { -1 };
            let magnitude = match self.read_number()? {
                Some(n) => i8::try_from(n).map_err(|_| unterminated.clone())?,
                None => {
                    let mut count = 1i8;
                    while self.peek(0) == Some(sign) && count < 8 {
                        self.pos += 1;
                        count += 1;
                    }
                    count
                }
            };
            charge = unit * magnitude;
        }

        let mut class = None;
        if self.peek(0) == Some(':') {
            self.pos += 1;
            class = Some(self.read_number()?.ok_or_else(|| unterminated.clone())?);
        }

        if self.peek(0) != Some(']') {
            return Err(unterminated);
        }
        self.pos += 1;

        Ok(Atom {
            element,
            aromatic,
            bracket: true,
            isotope,
            chirality,
            explicit_h,
            implicit_h: 0,
            charge,
            class,
        })
    }
}

/// Fill implicit hydrogens and check valences.
fn assign_hydrogens(mol: &mut Molecule) -> Result<(), SmilesError> {
    let bond_valences = mol.bond_valences();
    for (i, bond_valence) in bond_valences.into_iter().enumerate() {
        let atom = &mol.atoms[i];
        let Some(max) = atom.element.max_valence().map(u32::from) else {
            continue;
        };

        if atom.bracket {
            let allowed = max + u32::from(atom.charge.unsigned_abs());
            let valence = bond_valence + u32::from(atom.explicit_h);
            if valence > allowed {
                return Err(SmilesError::Valence {
                    atom: i,
                    symbol: atom.element.symbol.to_string(),
                    valence,
                    allowed,
                });
            }
            continue;
        }

        if bond_valence > max {
            return Err(SmilesError::Valence {
                atom: i,
                symbol: atom.element.symbol.to_string(),
                valence: bond_valence,
                allowed: max,
            });
        }

        let implicit_h = if atom.aromatic {
            // One valence goes to the delocalized system, except for the
            // chalcogens, which donate a lone pair instead.
            let pi = u32::from(!matches!(atom.element.number, 8 | 16 | 34 | 52));
            let lowest = u32::from(atom.element.valences[0]);
            lowest.saturating_sub(bond_valence + pi)
        } else {
            atom.element
                .valences
                .iter()
                .map(|v| u32::from(*v))
                .find(|v| *v >= bond_valence)
                .map(|v| v - bond_valence)
                .unwrap_or(0)
        };
        // Bounded by an element valence, so it always fits.
        mol.atoms[i].implicit_h = u8::try_from(implicit_h).unwrap_or(u8::MAX);
    }
    Ok(())
}

fn check_aromatic_rings(mol: &Molecule) -> Result<(), SmilesError> {
    let in_ring = mol.ring_atoms();
    match mol
        .atoms
        .iter()
        .enumerate()
        .find(|(i, a)| a.aromatic && !in_ring[*i])
    {
        Some((atom, _)) => Err(SmilesError::AromaticOutsideRing { atom }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(smiles: &str) -> String {
        parse(smiles).unwrap().to_smiles()
    }

    #[test]
    fn parses_simple_chain_with_hydrogens() {
        let mol = parse("CCO").unwrap();
        assert_eq!(mol.atoms.len(), 3);
        assert_eq!(mol.bonds.len(), 2);
        assert_eq!(mol.atoms[0].implicit_h, 3);
        assert_eq!(mol.atoms[1].implicit_h, 2);
        assert_eq!(mol.atoms[2].implicit_h, 1);
        assert_eq!(mol.hydrogen_count(), 6);
    }

    #[test]
    fn parses_branches_and_double_bonds() {
        let mol = parse("CC(=O)O").unwrap();
        assert_eq!(mol.atoms.len(), 4);
        assert_eq!(mol.bond_between(1, 2).unwrap().order, BondOrder::Double);
        assert_eq!(mol.bond_between(1, 3).unwrap().order, BondOrder::Single);
        assert_eq!(mol.atoms[1].implicit_h, 0);
        assert_eq!(mol.hydrogen_count(), 4);
    }

    #[test]
    fn parses_aromatic_rings() {
        let mol = parse("c1ccccc1").unwrap();
        assert_eq!(mol.atoms.len(), 6);
        assert_eq!(mol.bonds.len(), 6);
        assert!(mol.bonds.iter().all(|b| b.order == BondOrder::Aromatic));
        assert!(mol.atoms.iter().all(|a| a.implicit_h == 1));
        assert_eq!(mol.rings(), vec![vec![0, 1, 2, 3, 4, 5]]);

        let pyridine = parse("c1ccncc1").unwrap();
        assert_eq!(pyridine.atoms[3].implicit_h, 0);

        let furan = parse("c1ccoc1").unwrap();
        assert_eq!(furan.atoms[3].implicit_h, 0);

        let methylpyrrole = parse("Cn1cccc1").unwrap();
        assert_eq!(methylpyrrole.atoms[1].implicit_h, 0);
    }

    #[test]
    fn parses_bracket_atoms() {
        let mol = parse("[13CH3][C@@H](N)C(=O)[O-]").unwrap();
        let first = &mol.atoms[0];
        assert!(first.bracket);
        assert_eq!(first.isotope, Some(13));
        assert_eq!(first.explicit_h, 3);
        assert_eq!(mol.atoms[1].chirality, Chirality::Clockwise);
        assert_eq!(mol.atoms[5].charge, -1);

        let ammonium = parse("[NH4+]").unwrap();
        assert_eq!(ammonium.atoms[0].charge, 1);
        assert_eq!(ammonium.atoms[0].total_h(), 4);

        let pyrrole = parse("c1cc[nH]c1").unwrap();
        assert!(pyrrole.atoms[3].aromatic);
        assert_eq!(pyrrole.atoms[3].explicit_h, 1);

        let multi = parse("[Fe++]").unwrap();
        assert_eq!(multi.atoms[0].charge, 2);
    }

    #[test]
    fn parses_two_digit_ring_labels_and_components() {
        let mol = parse("C%12CC%12.O").unwrap();
        assert_eq!(mol.atoms.len(), 4);
        assert_eq!(mol.ring_closures.len(), 1);
        assert!(mol.is_ring_bond(0));
        assert!(mol.bond_between(2, 3).is_none());
    }

    #[test]
    fn rejects_malformed_strings() {
        assert_eq!(parse("").unwrap_err(), SmilesError::Empty);
        assert!(matches!(parse("C(C").unwrap_err(), SmilesError::UnbalancedBranch { .. }));
        assert!(matches!(parse("CC)").unwrap_err(), SmilesError::UnbalancedBranch { .. }));
        assert!(matches!(parse("C1CC").unwrap_err(), SmilesError::UnclosedRing { label: 1 }));
        assert!(matches!(parse("C11").unwrap_err(), SmilesError::RingSelfBond { .. }));
        assert!(matches!(parse("C12CC12").unwrap_err(), SmilesError::DuplicateBond { .. }));
        assert!(matches!(parse("CC=").unwrap_err(), SmilesError::DanglingBond { .. }));
        assert!(matches!(parse("=CC").unwrap_err(), SmilesError::DanglingBond { .. }));
        assert!(matches!(parse("C[Xx]").unwrap_err(), SmilesError::UnknownElement { .. }));
        assert!(matches!(parse("C[CH3").unwrap_err(), SmilesError::UnterminatedBracket { .. }));
        assert!(matches!(parse("CQ").unwrap_err(), SmilesError::UnexpectedChar { .. }));
    }

    #[test]
    fn rejects_valence_violations() {
        assert!(matches!(
            parse("C(C)(C)(C)(C)C").unwrap_err(),
            SmilesError::Valence { atom: 0, .. }
        ));
        assert!(matches!(parse("O=O=O").unwrap_err(), SmilesError::Valence { .. }));
        assert!(matches!(parse("FC(F)(F)(F)F").unwrap_err(), SmilesError::Valence { .. }));
        // Hypervalent sulfur and nitrogen stay within their allowed valences.
        assert!(parse("CS(=O)(=O)C").is_ok());
        assert!(parse("C[N+](=O)[O-]").is_ok());
    }

    #[test]
    fn rejects_aromatic_atoms_outside_rings() {
        assert!(matches!(
            parse("cC").unwrap_err(),
            SmilesError::AromaticOutsideRing { atom: 0 }
        ));
    }

    #[test]
    fn writer_round_trips() {
        assert_eq!(canonical("OCC"), "OCC");
        assert_eq!(canonical("CC(=O)O"), "CC(=O)O");
        assert_eq!(canonical("c1ccccc1"), "c1ccccc1");
        assert_eq!(canonical("C1=CC=CC=C1"), "C1=CC=CC=C1");
        assert_eq!(canonical("C%10CC%10"), "C1CC1");
        assert_eq!(canonical("[NH4+].[Cl-]"), "[NH4+].[Cl-]");
        assert_eq!(canonical("c1ccccc1-c1ccccc1"), "c1ccccc1-c1ccccc1");
    }

    #[test]
    fn writer_output_is_stable() {
        for smiles in [
            "CC(=O)Oc1ccccc1C(=O)O",
            "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",
            "c1ccc2ccccc2c1",
            "C1CC2CCC1C2",
            "F/C=C/F",
            "N[C@@H](C)C(=O)O",
        ] {
            let once = canonical(smiles);
            let twice = canonical(&once);
            assert_eq!(once, twice, "unstable output for {smiles}");
            let original = parse(smiles).unwrap();
            let reparsed = parse(&once).unwrap();
            assert_eq!(original.atoms.len(), reparsed.atoms.len());
            assert_eq!(original.bonds.len(), reparsed.bonds.len());
            assert_eq!(original.hydrogen_count(), reparsed.hydrogen_count());
        }
    }

    #[test]
    fn fused_rings_are_detected() {
        let naphthalene = parse("c1ccc2ccccc2c1").unwrap();
        let rings = naphthalene.rings();
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|r| r.len() == 6));
        assert!(naphthalene.ring_atoms().iter().all(|r| *r));
    }

    #[test]
    fn ring_membership_excludes_substituents() {
        let toluene = parse("Cc1ccccc1").unwrap();
        let in_ring = toluene.ring_atoms();
        assert!(!in_ring[0]);
        assert!(in_ring[1..].iter().all(|r| *r));
        assert!(!toluene.ring_bonds()[0]);
    }

    #[test]
    fn bonds_between_rings_are_not_ring_bonds() {
        let biphenyl = parse("c1ccccc1-c1ccccc1").unwrap();
        let ring_bonds = biphenyl.ring_bonds();
        let link = biphenyl
            .bonds
            .iter()
            .position(|b| (b.a, b.b) == (5, 6) || (b.a, b.b) == (0, 6))
            .unwrap();
        assert!(!ring_bonds[link]);
        assert_eq!(ring_bonds.iter().filter(|r| **r).count(), 12);

        let spiro = parse("C1CCC12CCC2").unwrap();
        assert!(spiro.ring_bonds().iter().all(|r| *r));
    }

    #[test]
    fn oversized_numbers_in_brackets_are_rejected() {
        assert!(matches!(parse("[99999C]C").unwrap_err(), SmilesError::InvalidNumber { pos: 1 }));
        assert!(matches!(parse("[CH99999]").unwrap_err(), SmilesError::InvalidNumber { .. }));
        assert!(matches!(parse("[CH300]").unwrap_err(), SmilesError::UnterminatedBracket { .. }));
        assert_eq!(parse("[2H][H]").unwrap().atoms[0].isotope, Some(2));
    }

    #[test]
    fn valence_sums_do_not_wrap() {
        match parse("[CH255]C").unwrap_err() {
            SmilesError::Valence { valence, allowed, .. } => {
                assert_eq!(valence, 256);
                assert_eq!(allowed, 4);
            }
            other => panic!("unexpected error {other:?}"),
        }
        let crowded = format!("[C]{}C", "(C)".repeat(256));
        assert!(matches!(
            parse(&crowded).unwrap_err(),
            SmilesError::Valence { atom: 0, valence: 257, .. }
        ));
    }
}
