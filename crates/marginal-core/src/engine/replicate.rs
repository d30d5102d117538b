//! The replicate/divide combinator for variables shared across use-sites.
//!
//! When one variable is read at many sites (typically one per block of a
//! partitioned range), each site sends a contribution message toward the
//! definition. The group maintains the running aggregate of all
//! contributions, and recovers the message *excluding* one site by dividing
//! the aggregate by that site's own previous contribution, so updating one
//! site never requires resending every other site's message.
//!
//! Within a sweep, sites only ever see the previous sweep's aggregate:
//! submissions are staged and folded in at the sweep boundary by `refresh`.
//! That visibility rule is what makes the divide step exact: a site's
//! effective prior never double-counts its own current contribution.

use crate::engine::errors::RuntimeError;
use crate::engine::message::Message;

/// A shared variable's defining message plus per-use-site contributions.
#[derive(Debug, Clone)]
pub struct ReplicateGroup {
    definition: Message,
    to_definition: Message,
    contributions: Vec<Message>,
    staged: Vec<Option<Message>>,
}

impl ReplicateGroup {
    /// Creates a group with `sites` use-sites, all starting uniform.
    pub fn new(definition: Message, sites: usize) -> Result<Self, RuntimeError> {
        if sites == 0 {
            return Err(RuntimeError::Argument(
                "replicate group must have at least one use-site".into(),
            ));
        }
        let uniform = definition.uniform_like();
        Ok(ReplicateGroup {
            to_definition: uniform.clone(),
            contributions: vec![uniform; sites],
            staged: vec![None; sites],
            definition,
        })
    }

    pub fn sites(&self) -> usize {
        self.contributions.len()
    }

    pub fn definition(&self) -> &Message {
        &self.definition
    }

    fn check_site(&self, site: usize) -> Result<(), RuntimeError> {
        if site >= self.contributions.len() {
            return Err(RuntimeError::Argument(format!(
                "use-site {site} out of range for replicate group with {} sites",
                self.contributions.len()
            )));
        }
        Ok(())
    }

    /// The effective prior for `site`: the definition times every *other*
    /// site's previous contribution, obtained by dividing the aggregate by
    /// this site's own.
    pub fn effective_prior(&self, site: usize) -> Result<Message, RuntimeError> {
        self.check_site(site)?;
        let others = self.to_definition.ratio(&self.contributions[site])?;
        self.definition.product(&others)
    }

    /// Stages `site`'s contribution for this sweep. Visible to other sites
    /// only after the next `refresh`.
    pub fn submit(&mut self, site: usize, contribution: Message) -> Result<(), RuntimeError> {
        self.check_site(site)?;
        self.staged[site] = Some(contribution);
        Ok(())
    }

    /// Sweep boundary: folds staged contributions in and rebuilds the
    /// aggregate.
    pub fn refresh(&mut self) -> Result<(), RuntimeError> {
        for (current, staged) in self.contributions.iter_mut().zip(&mut self.staged) {
            if let Some(fresh) = staged.take() {
                *current = fresh;
            }
        }
        let mut aggregate = self.definition.uniform_like();
        for contribution in &self.contributions {
            aggregate = aggregate.product(contribution)?;
        }
        self.to_definition = aggregate;
        Ok(())
    }

    /// The shared variable's marginal: definition times the aggregate.
    pub fn marginal(&self) -> Result<Message, RuntimeError> {
        self.definition.product(&self.to_definition)
    }

    /// Drops all contributions back to uniform (cold start).
    pub fn reset(&mut self) {
        let uniform = self.definition.uniform_like();
        self.to_definition = uniform.clone();
        for contribution in &mut self.contributions {
            *contribution = uniform.clone();
        }
        for staged in &mut self.staged {
            *staged = None;
        }
    }
}
