//! Snapshot-based undo/redo log
//!
//! Objects are registered by key right before they change. The log captures
//! them into the open transaction frame; the first capture of a key within a
//! frame wins, so undoing the frame restores the state that preceded the whole
//! transaction.

use rustc_hash::FxHashSet;
use std::hash::Hash;

/// Owner of reversible objects, addressed by key
pub trait Restorable<K> {
    type Capture;

    /// Immutable snapshot of the object behind `key`
    fn capture(&self, key: &K) -> Self::Capture;

    /// Put back a snapshot previously produced by `capture`
    fn restore(&mut self, key: &K, capture: Self::Capture);
}

/// One transaction: the earliest capture of every key it touched
#[derive(Debug)]
struct Frame<K, C> {
    entries: Vec<(K, C)>,
    keys: FxHashSet<K>,
}

impl<K: Eq + Hash + Clone, C> Frame<K, C> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            keys: FxHashSet::default(),
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, key: K, capture: C) {
        self.keys.insert(key.clone());
        self.entries.push((key, capture));
    }

    /// Capture the current state of every key, then restore this frame.
    /// The returned frame reverses the operation.
    fn apply<T>(self, target: &mut T) -> Frame<K, C>
    where
        T: Restorable<K, Capture = C>,
    {
        let mut reverse = Frame::new();
        for (key, _) in &self.entries {
            reverse.push(key.clone(), target.capture(key));
        }
        for (key, capture) in self.entries.into_iter().rev() {
            target.restore(&key, capture);
        }
        reverse
    }
}

/// Undo and redo stacks of transaction frames
#[derive(Debug)]
pub struct UndoLog<K, C> {
    done: Vec<Frame<K, C>>,
    undone: Vec<Frame<K, C>>,
    /// Whether the top of `done` still accepts registrations
    accepting: bool,
}

impl<K: Eq + Hash + Clone, C> Default for UndoLog<K, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, C> UndoLog<K, C> {
    pub fn new() -> Self {
        Self {
            done: Vec::new(),
            undone: Vec::new(),
            accepting: false,
        }
    }

    /// Start a new transaction; an empty open frame is reused
    pub fn open(&mut self) {
        if self.accepting && self.done.last().is_some_and(|f| f.is_empty()) {
            return;
        }
        self.done.push(Frame::new());
        self.accepting = true;
    }

    /// Capture `key` into the open frame unless it is already there
    pub fn register<T>(&mut self, target: &T, key: K)
    where
        T: Restorable<K, Capture = C>,
    {
        if !self.accepting {
            self.open();
        }
        let undone = &mut self.undone;
        let Some(frame) = self.done.last_mut() else {
            return;
        };
        if frame.keys.contains(&key) {
            return;
        }
        if frame.is_empty() {
            // A fresh mutation invalidates whatever was undone before it
            undone.clear();
        }
        frame.push(key.clone(), target.capture(&key));
    }

    /// Revert the most recent non-empty transaction
    pub fn undo<T>(&mut self, target: &mut T) -> bool
    where
        T: Restorable<K, Capture = C>,
    {
        self.accepting = false;
        while let Some(frame) = self.done.pop() {
            if frame.is_empty() {
                continue;
            }
            let reverse = frame.apply(target);
            self.undone.push(reverse);
            return true;
        }
        false
    }

    /// Re-apply the most recently undone transaction
    pub fn redo<T>(&mut self, target: &mut T) -> bool
    where
        T: Restorable<K, Capture = C>,
    {
        self.accepting = false;
        match self.undone.pop() {
            Some(frame) => {
                let reverse = frame.apply(target);
                self.done.push(reverse);
                true
            }
            None => false,
        }
    }

    /// Forget every frame; earlier transactions become permanent
    pub fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
        self.accepting = false;
    }

    pub fn can_undo(&self) -> bool {
        self.done.iter().any(|f| !f.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Number of non-empty transactions that can be undone
    pub fn depth(&self) -> usize {
        self.done.iter().filter(|f| !f.is_empty()).count()
    }
}
