//! svnbridge - present a Git repository to Subversion clients
//!
//! A Git repository is exposed as if it were a Subversion repository:
//! clients read and write integer revisions, acquire path locks, and drive
//! commit editors, while the authoritative storage remains the Git object
//! database with ordinary branch refs.
//!
//! # Architecture
//!
//! The crate is built from four tightly coupled subsystems:
//!
//! - [`repo::GitRepository`] - the revision mapping cache: a persistent,
//!   monotonically growing sequence of SVN revisions, each anchored to a Git
//!   commit, persisted inside the object database on a side branch
//! - [`repo::GitFile`] - a read-only projection of a Git tree as SVN nodes
//!   carrying properties derived from file modes and in-tree config files
//! - [`repo::GitCommitBuilder`] - an editor-style commit builder with
//!   property validation and a serialized fast-forward push
//! - [`repo::LockManager`] - token-based path locks with force/steal,
//!   break-unlock and commit precondition checks
//!
//! The SVN wire protocol, network sessions, authentication and configuration
//! loading are external collaborators; this crate is the storage core they
//! drive.
//!
//! # Correctness invariants
//!
//! 1. Revision ids are dense from 0 and equal the depth of the cache chain
//! 2. Revision dates answered by the date index are monotone non-decreasing
//! 3. Commits become visible to readers atomically when the revision store
//!    swaps in its extended state
//! 4. Two concurrent committers serialize on a single push mutex; a losing
//!    non-fast-forward push is reported, never silently dropped

pub mod core;
pub mod repo;
