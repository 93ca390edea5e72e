//! Molecular property estimates computed from a parsed [`Molecule`].
//!
//! Molecular weight uses standard atomic weights. Drug-likeness follows the
//! QED construction (Bickerton et al., 2012): eight descriptors mapped
//! through asymmetric double-sigmoid desirability functions and combined as
//! a weighted geometric mean. The descriptors themselves are graph-level
//! estimates rather than the fitted Crippen/TPSA/SMARTS models of a full
//! toolkit. Synthetic accessibility follows the Ertl & Schuffenhauer
//! construction with the fragment-frequency term replaced by an atom-rarity
//! estimate.

use serde::{Deserialize, Serialize};

use crate::elements::HYDROGEN_MASS;
use crate::smiles::{BondOrder, Molecule};

/// Average molecular weight in g/mol, including implicit hydrogens.
pub fn molecular_weight(mol: &Molecule) -> f64 {
    mol.atoms
        .iter()
        .map(|atom| {
            let heavy = match atom.isotope {
                Some(isotope) => f64::from(isotope),
                None => atom.element.mass,
            };
            heavy + f64::from(atom.total_h()) * HYDROGEN_MASS
        })
        .sum()
}

/// The eight QED descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptors {
    pub mw: f64,
    pub alogp: f64,
    pub hba: f64,
    pub hbd: f64,
    pub psa: f64,
    pub rotb: f64,
    pub arom: f64,
    pub alerts: f64,
}

impl Descriptors {
    pub fn compute(mol: &Molecule) -> Self {
        let ring_bonds = mol.ring_bonds();
        let degrees: Vec<usize> = (0..mol.atoms.len()).map(|i| mol.degree(i)).collect();

        let mut hba = 0usize;
        let mut hbd = 0usize;
        let mut psa = 0.0;
        let mut alogp = 0.0;

        for (i, atom) in mol.atoms.iter().enumerate() {
            let h = atom.total_h();
            let has_double = mol
                .bonds
                .iter()
                .any(|b| (b.a == i || b.b == i) && b.order == BondOrder::Double);
            let has_triple = mol
                .bonds
                .iter()
                .any(|b| (b.a == i || b.b == i) && b.order == BondOrder::Triple);

            match atom.element.number {
                7 => {
                    if h > 0 {
                        hbd += 1;
                    }
                    if h == 0 && atom.charge <= 0 {
                        hba += 1;
                    }
                    psa += match (atom.aromatic, h, has_double, has_triple) {
                        (true, 0, _, _) => 12.89,
                        (true, _, _, _) => 15.79,
                        (false, _, _, true) => 23.79,
                        (false, 0, true, _) => 12.36,
                        (false, 0, false, _) => 3.24,
                        (false, 1, _, _) => 12.03,
                        (false, _, _, _) => 26.02,
                    };
                    alogp += if atom.aromatic { -0.5 } else { -0.6 };
                }
                8 => {
                    hba += 1;
                    if h > 0 {
                        hbd += 1;
                    }
                    psa += match (atom.aromatic, h, has_double) {
                        (true, _, _) => 13.14,
                        (false, _, true) => 17.07,
                        (false, 0, false) => 9.23,
                        (false, _, false) => 20.23,
                    };
                    alogp += if has_double { -0.45 } else { -0.4 };
                }
                6 => alogp += if atom.aromatic { 0.15 } else { 0.11 },
                16 => alogp += 0.4,
                9 => alogp += 0.4,
                17 => alogp += 0.65,
                35 => alogp += 0.85,
                53 => alogp += 1.05,
                _ => alogp += 0.2,
            }

            if atom.element.number == 6 {
                alogp += 0.12 * f64::from(h);
            } else if atom.element.is_hetero() {
                alogp -= 0.4 * f64::from(h);
            }
            if atom.charge != 0 {
                alogp -= 1.0;
            }
        }

        let rotb = mol
            .bonds
            .iter()
            .zip(&ring_bonds)
            .filter(|(b, ring)| {
                !**ring
                    && b.order == BondOrder::Single
                    && degrees[b.a] > 1
                    && degrees[b.b] > 1
                    && mol.atoms[b.a].element.number != 1
                    && mol.atoms[b.b].element.number != 1
            })
            .count();

        let arom = mol
            .rings()
            .iter()
            .filter(|ring| ring.iter().all(|a| mol.atoms[*a].aromatic))
            .count();

        Self {
            mw: molecular_weight(mol),
            alogp,
            hba: hba as f64,
            hbd: hbd as f64,
            psa,
            rotb: rotb as f64,
            arom: arom as f64,
            alerts: structural_alerts(mol) as f64,
        }
    }

    fn as_array(&self) -> [f64; 8] {
        [
            self.mw,
            self.alogp,
            self.hba,
            self.hbd,
            self.psa,
            self.rotb,
            self.arom,
            self.alerts,
        ]
    }
}

/// Count of reactive or otherwise undesirable groups detectable on the
/// bond graph: peroxides, disulfides, azo and hydrazine links, aldehydes,
/// acyl halides, thiols and three-membered heterocycles.
pub fn structural_alerts(mol: &Molecule) -> usize {
    let number = |i: usize| mol.atoms[i].element.number;
    let mut alerts = 0;

    for bond in &mol.bonds {
        let pair = {
            let (x, y) = (number(bond.a), number(bond.b));
            (x.min(y), x.max(y))
        };
        match (pair, bond.order) {
            ((8, 8), BondOrder::Single) | ((16, 16), BondOrder::Single) => alerts += 1,
            ((7, 7), BondOrder::Double) | ((7, 7), BondOrder::Single)
                if !mol.atoms[bond.a].aromatic =>
            {
                alerts += 1
            }
            ((6, 8), BondOrder::Double) => {
                let carbon = if number(bond.a) == 6 { bond.a } else { bond.b };
                let atom = &mol.atoms[carbon];
                let acyl_halide = mol.bonds.iter().any(|b| {
                    (b.a == carbon || b.b == carbon)
                        && mol.atoms[b.other(carbon)].element.is_halogen()
                });
                if atom.total_h() > 0 && mol.degree(carbon) <= 2 {
                    alerts += 1;
                } else if acyl_halide {
                    alerts += 1;
                }
            }
            _ => {}
        }
    }

    alerts += mol
        .atoms
        .iter()
        .filter(|a| a.element.number == 16 && a.total_h() > 0)
        .count();

    alerts += mol
        .rings()
        .iter()
        .filter(|ring| ring.len() == 3 && ring.iter().any(|a| mol.atoms[*a].element.is_hetero()))
        .count();

    alerts
}

/// Asymmetric double-sigmoid parameters `[A, B, C, D, E, F, DMAX]` for the
/// QED descriptors, in [`Descriptors::as_array`] order.
const ADS_PARAMETERS: [[f64; 7]; 8] = [
    [2.817065973, 392.5754953, 290.7489764, 2.419764353, 49.22325677, 65.37051707, 104.9805561],
    [3.172690585, 137.8624751, 2.534937431, 4.581497897, 0.822739154, 0.576295591, 131.3186604],
    [2.948620388, 160.4605972, 3.615294657, 4.435986202, 0.290141953, 1.300669958, 148.7763046],
    [1.618662227, 1010.051101, 0.985094388, 0.000000001, 0.713820843, 0.920922555, 258.1632616],
    [1.876861559, 125.2232657, 62.90773554, 87.83366614, 12.01999824, 28.51324732, 104.5686167],
    [0.010000000, 272.4121427, 2.558379970, 1.565547684, 1.271567166, 2.758063707, 105.4420403],
    [3.217788970, 957.7374108, 2.274627939, 0.000000001, 1.317690384, 0.375760881, 312.3372610],
    [0.010000000, 1199.094025, -0.09002883, 0.000000001, 0.185904477, 0.875193782, 417.7253140],
];

/// Mean descriptor weights.
const QED_WEIGHTS: [f64; 8] = [0.66, 0.46, 0.05, 0.61, 0.06, 0.65, 0.48, 0.95];

fn desirability(x: f64, p: &[f64; 7]) -> f64 {
    let [a, b, c, d, e, f, dmax] = *p;
    let exp1 = 1.0 + (-(x - c + d / 2.0) / e).exp();
    let exp2 = 1.0 + (-(x - c - d / 2.0) / f).exp();
    (a + b / exp1 * (1.0 - 1.0 / exp2)) / dmax
}

/// Quantitative estimate of drug-likeness in [0, 1].
pub fn qed(mol: &Molecule) -> f64 {
    qed_from_descriptors(&Descriptors::compute(mol))
}

pub fn qed_from_descriptors(descriptors: &Descriptors) -> f64 {
    let values = descriptors.as_array();
    let total_weight: f64 = QED_WEIGHTS.iter().sum();
    let log_sum: f64 = values
        .iter()
        .zip(ADS_PARAMETERS.iter())
        .zip(QED_WEIGHTS.iter())
        .map(|((x, p), w)| w * desirability(*x, p).max(1e-6).ln())
        .sum();
    (log_sum / total_weight).exp().clamp(0.0, 1.0)
}

/// Synthetic accessibility estimate in [1, 10], lower is easier.
pub fn synthetic_accessibility(mol: &Molecule) -> f64 {
    let heavy: Vec<usize> = (0..mol.atoms.len())
        .filter(|i| mol.atoms[*i].element.number != 1)
        .collect();
    let n_atoms = heavy.len() as f64;
    if heavy.is_empty() {
        return 10.0;
    }

    let degrees: Vec<usize> = (0..mol.atoms.len()).map(|i| mol.degree(i)).collect();

    // Atom-rarity stand-in for the fragment-frequency score.
    let fragment_score = heavy
        .iter()
        .map(|&i| {
            let atom = &mol.atoms[i];
            match atom.element.number {
                _ if atom.charge != 0 => -1.0,
                6 | 7 | 8 if degrees[i] <= 3 => 0.5,
                6 if degrees[i] == 4 => 0.0,
                9 | 17 | 35 => 0.25,
                16 if degrees[i] <= 2 => 0.25,
                16 | 15 => -0.5,
                53 => -0.25,
                _ => -1.5,
            }
        })
        .sum::<f64>()
        / n_atoms;

    let rings = mol.rings();
    let n_chiral = mol.atoms.iter().filter(|a| a.is_chiral()).count() as f64;
    let mut ring_count = vec![0usize; mol.atoms.len()];
    for ring in &rings {
        for &atom in ring {
            ring_count[atom] += 1;
        }
    }
    let mut n_spiro = 0usize;
    let mut n_bridgehead = 0usize;
    for (i, ring_a) in rings.iter().enumerate() {
        for ring_b in rings.iter().skip(i + 1) {
            let shared = ring_a.iter().filter(|a| ring_b.contains(a)).count();
            match shared {
                1 => n_spiro += 1,
                s if s > 2 && s < ring_a.len().min(ring_b.len()) => n_bridgehead += 2,
                _ => {}
            }
        }
    }
    let n_macrocycles = rings.iter().filter(|r| r.len() > 8).count();

    let size_penalty = n_atoms.powf(1.005) - n_atoms;
    let stereo_penalty = (n_chiral + 1.0).log10();
    let spiro_penalty = (n_spiro as f64 + 1.0).log10();
    let bridge_penalty = (n_bridgehead as f64 + 1.0).log10();
    let macrocycle_penalty = if n_macrocycles > 0 { 2f64.log10() } else { 0.0 };
    let complexity = -size_penalty - stereo_penalty - spiro_penalty - bridge_penalty - macrocycle_penalty;

    // Symmetry correction: many identical atom environments make a molecule
    // easier than its size suggests.
    let mut environments: Vec<(u8, bool, usize, u8)> = heavy
        .iter()
        .map(|&i| {
            let a = &mol.atoms[i];
            (a.element.number, a.aromatic, degrees[i], a.total_h())
        })
        .collect();
    environments.sort_unstable();
    environments.dedup();
    let symmetry = if heavy.len() > environments.len() {
        (n_atoms / environments.len() as f64).ln() * 0.5
    } else {
        0.0
    };

    let raw = fragment_score + complexity + symmetry;
    let (min, max) = (-4.0, 2.5);
    let mut score = 11.0 - (raw - min + 1.0) / (max - min) * 9.0;
    if score > 8.0 {
        score = 8.0 + (score + 1.0 - 9.0).ln();
    }
    score.clamp(1.0, 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse;

    fn mol(smiles: &str) -> Molecule {
        parse(smiles).unwrap()
    }

    #[test]
    fn molecular_weight_matches_reference_values() {
        let water = molecular_weight(&mol("O"));
        assert!((water - 18.015).abs() < 1e-3, "water: {water}");

        let glucose = molecular_weight(&mol("OCC1OC(O)C(O)C(O)C1O"));
        assert!((glucose - 180.156).abs() < 1e-2, "glucose: {glucose}");

        let aspirin = molecular_weight(&mol("CC(=O)Oc1ccccc1C(=O)O"));
        assert!((aspirin - 180.159).abs() < 1e-2, "aspirin: {aspirin}");

        let salt = molecular_weight(&mol("[Na+].[Cl-]"));
        assert!((salt - 58.443).abs() < 1e-2, "salt: {salt}");
    }

    #[test]
    fn heavier_isotopes_increase_weight() {
        assert!(molecular_weight(&mol("[13CH4]")) > molecular_weight(&mol("C")));
    }

    #[test]
    fn descriptors_for_aspirin() {
        let d = Descriptors::compute(&mol("CC(=O)Oc1ccccc1C(=O)O"));
        assert_eq!(d.hbd, 1.0);
        assert_eq!(d.hba, 4.0);
        assert_eq!(d.arom, 1.0);
        assert!(d.rotb >= 2.0);
        assert!(d.psa > 50.0 && d.psa < 80.0, "psa: {}", d.psa);
        assert_eq!(d.alerts, 0.0);
    }

    #[test]
    fn alerts_flag_reactive_groups() {
        assert_eq!(structural_alerts(&mol("COOC")), 1);
        assert_eq!(structural_alerts(&mol("CC=O")), 1);
        assert_eq!(structural_alerts(&mol("CC(=O)Cl")), 1);
        assert_eq!(structural_alerts(&mol("C1OC1")), 1);
        assert_eq!(structural_alerts(&mol("CCS")), 1);
        assert_eq!(structural_alerts(&mol("CCO")), 0);
    }

    #[test]
    fn qed_is_bounded_and_prefers_drug_like_structures() {
        let drug_like = qed(&mol("CC(=O)Nc1ccc(O)cc1"));
        let tiny = qed(&mol("C"));
        let greasy = qed(&mol("CCCCCCCCCCCCCCCCCCCCCCCCCCCCCC"));
        for value in [drug_like, tiny, greasy] {
            assert!((0.0..=1.0).contains(&value), "qed out of range: {value}");
        }
        assert!(drug_like > tiny, "{drug_like} <= {tiny}");
        assert!(drug_like > greasy, "{drug_like} <= {greasy}");
    }

    #[test]
    fn desirability_peaks_near_ideal_weight() {
        let p = &ADS_PARAMETERS[0];
        assert!(desirability(300.0, p) > desirability(100.0, p));
        assert!(desirability(300.0, p) > desirability(700.0, p));
        assert!(desirability(300.0, p) <= 1.0 + 1e-6);
    }

    #[test]
    fn synthetic_accessibility_is_bounded_and_ranks_complexity() {
        let simple = synthetic_accessibility(&mol("c1ccccc1"));
        let complex = synthetic_accessibility(&mol(
            "C[C@H]1C[C@@H]2[C@H]3C[C@H](F)C4=CC(=O)C=C[C@]4(C)[C@@]3(F)[C@@H](O)C[C@]2(C)[C@@]1(O)C(=O)CO",
        ));
        let exotic = synthetic_accessibility(&mol("[Pt+2].[Cl-].[Cl-]"));
        for value in [simple, complex, exotic] {
            assert!((1.0..=10.0).contains(&value), "sa out of range: {value}");
        }
        assert!(simple < complex, "{simple} >= {complex}");
        assert!(simple < exotic, "{simple} >= {exotic}");
    }
}
