//! Deterministic synthetic initial graphs.
//!
//! Produces the round-0 node set: `population` distinct addresses drawn from
//! the address space, of which `seeds` start `INFECTED` (each with a hit list
//! of other populated addresses), a fraction `immune_ratio` start `IMMUNE`
//! and the rest are `VULNERABLE`. The output is sorted by address.

use rand::{rngs::StdRng, seq::index, Rng as _, SeedableRng};
use schimmy_core::{Address, Error, Node, Result, Status};
use serde::{Deserialize, Serialize};

/// Shape of a generated graph.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphSpec {
    /// Number of populated addresses.
    pub population: u64,
    /// How many of them start infected.
    pub seeds: u64,
    /// Fraction of the population that starts immune.
    pub immune_ratio: f64,
    /// Hit-list length given to every seed.
    pub hit_list_len: usize,
    /// RNG seed.
    pub seed: u64,
}

impl Default for GraphSpec {
    fn default() -> Self {
        Self {
            population: 64,
            seeds: 1,
            immune_ratio: 0.0,
            hit_list_len: 0,
            seed: 42,
        }
    }
}

impl GraphSpec {
    /// Number of immune nodes implied by `immune_ratio`, capped so seeds
    /// always fit.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn immune_count(&self) -> u64 {
        let wanted = (self.immune_ratio * self.population as f64).round() as u64;
        wanted.min(self.population.saturating_sub(self.seeds))
    }

    fn check(&self, address_space: u64) -> Result<()> {
        if self.population == 0 {
            return Err(Error::config("population must be at least 1"));
        }
        if self.population > address_space {
            return Err(Error::config(format!(
                "population {} exceeds address space {address_space}",
                self.population
            )));
        }
        if self.seeds > self.population {
            return Err(Error::config(format!(
                "{} seeds requested for a population of {}",
                self.seeds, self.population
            )));
        }
        if !(0.0..=1.0).contains(&self.immune_ratio) {
            return Err(Error::config(format!(
                "immune ratio {} outside [0, 1]",
                self.immune_ratio
            )));
        }
        Ok(())
    }
}

/// Build the initial node set for an address space of `address_space`.
///
/// # Errors
/// [`Error::Configuration`] if `spec` does not fit the address space.
pub fn generate_graph(address_space: u64, spec: &GraphSpec) -> Result<Vec<Node>> {
    spec.check(address_space)?;
    let space = usize::try_from(address_space)
        .map_err(|_| Error::config("address space too large for this platform"))?;
    let population = usize::try_from(spec.population)
        .map_err(|_| Error::config("population too large for this platform"))?;

    let mut rng = StdRng::seed_from_u64(spec.seed);
    // Sampled indices come back in random order; that order assigns roles.
    let addresses: Vec<Address> = index::sample(&mut rng, space, population)
        .into_iter()
        .map(|i| i as Address)
        .collect();

    let seeds = usize::try_from(spec.seeds).unwrap_or(population);
    let immune = usize::try_from(spec.immune_count()).unwrap_or(0);

    let mut nodes = Vec::with_capacity(population);
    for (i, &address) in addresses.iter().enumerate() {
        let node = if i < seeds {
            let hit_list = draw_hit_list(&mut rng, &addresses, address, spec.hit_list_len);
            Node::new(address, Status::Infected).with_hit_list(hit_list)
        } else if i < seeds + immune {
            Node::new(address, Status::Immune)
        } else {
            Node::new(address, Status::Vulnerable)
        };
        nodes.push(node);
    }
    nodes.sort_unstable_by_key(|n| n.address);
    Ok(nodes)
}

fn draw_hit_list(
    rng: &mut StdRng,
    addresses: &[Address],
    own: Address,
    len: usize,
) -> Vec<Address> {
    if addresses.len() < 2 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let pick = addresses[rng.random_range(0..addresses.len())];
        if pick != own {
            out.push(pick);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn spec() -> GraphSpec {
        GraphSpec {
            population: 40,
            seeds: 3,
            immune_ratio: 0.25,
            hit_list_len: 4,
            seed: 9,
        }
    }

    #[test]
    fn counts_match_the_spec() {
        let nodes = generate_graph(64, &spec()).unwrap();
        assert_eq!(nodes.len(), 40);
        let count = |st| nodes.iter().filter(|n| n.status == st).count();
        assert_eq!(count(Status::Infected), 3);
        assert_eq!(count(Status::Immune), 10);
        assert_eq!(count(Status::Vulnerable), 27);

        let distinct: BTreeSet<_> = nodes.iter().map(|n| n.address).collect();
        assert_eq!(distinct.len(), 40);
        assert!(nodes.windows(2).all(|w| w[0].address < w[1].address));
    }

    #[test]
    fn seed_hit_lists_point_at_other_populated_nodes() {
        let nodes = generate_graph(64, &spec()).unwrap();
        let populated: BTreeSet<_> = nodes.iter().map(|n| n.address).collect();
        for n in nodes.iter().filter(|n| n.status == Status::Infected) {
            assert_eq!(n.hit_list.len(), 4);
            assert!(n.hit_list.iter().all(|a| populated.contains(a) && *a != n.address));
        }
        for n in nodes.iter().filter(|n| n.status != Status::Infected) {
            assert!(n.hit_list.is_empty());
        }
    }

    #[test]
    fn deterministic_per_seed() {
        assert_eq!(
            generate_graph(256, &spec()).unwrap(),
            generate_graph(256, &spec()).unwrap()
        );
        let other = GraphSpec { seed: 10, ..spec() };
        assert_ne!(
            generate_graph(256, &spec()).unwrap(),
            generate_graph(256, &other).unwrap()
        );
    }

    #[test]
    fn rejects_specs_that_do_not_fit() {
        let too_big = GraphSpec {
            population: 65,
            ..spec()
        };
        assert!(matches!(
            generate_graph(64, &too_big),
            Err(Error::Configuration(_))
        ));
        let too_many_seeds = GraphSpec {
            seeds: 41,
            ..spec()
        };
        assert!(generate_graph(64, &too_many_seeds).is_err());
        let bad_ratio = GraphSpec {
            immune_ratio: 1.5,
            ..spec()
        };
        assert!(generate_graph(64, &bad_ratio).is_err());
    }

    #[test]
    fn lone_seed_gets_no_hit_list() {
        let s = GraphSpec {
            population: 1,
            seeds: 1,
            immune_ratio: 0.0,
            hit_list_len: 5,
            seed: 1,
        };
        let nodes = generate_graph(64, &s).unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].hit_list.is_empty());
    }
}
