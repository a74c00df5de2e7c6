//! Interning of axes, so that value equal axes across a collection are the same instance.
//!
use std::{collections::HashSet, sync::Arc};

use parking_lot::Mutex;

use crate::axis::Axis;

/// A thread safe set of canonical axes.
///
/// ``intern`` returns the canonical instance equal to the axis passed in, adding the axis as the
/// canonical instance if none is known yet. Composite time axes are also made to reference the
/// canonical instance of their runtime axis, when one is known.
///
/// Axes are immutable once built, so canonical instances never need to be invalidated.
///
#[derive(Default)]
pub struct AxisInterner {
    axes: Mutex<HashSet<Axis>>,
}

impl AxisInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical instance equal to `axis`.
    ///
    pub fn intern(&self, axis: Axis) -> Axis {
        let mut axes = self.axes.lock();
        let axis = relink(&axes, &axis).unwrap_or(axis);
        if let Some(canonical) = axes.get(&axis) {
            return canonical.clone();
        }
        axes.insert(axis.clone());

        axis
    }

    /// Make `axis` canonical, replacing any value equal axis already known. Used to seed the
    /// set with a master runtime axis before interning the axes that should reference it.
    ///
    pub fn seed(&self, axis: Axis) {
        self.axes.lock().replace(axis);
    }

    pub fn len(&self) -> usize {
        self.axes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.lock().is_empty()
    }

    /// Approximate number of bytes held by the canonical axes.
    ///
    pub fn est_memory_size(&self) -> usize {
        self.axes.lock().iter().map(Axis::est_memory_size).sum()
    }

    pub fn clear(&self) {
        self.axes.lock().clear();
    }
}

/// A composite time axis referencing the canonical instance of its runtime axis, if that isn't
/// already the case.
///
fn relink(axes: &HashSet<Axis>, axis: &Axis) -> Option<Axis> {
    let time2d = axis.as_time2d()?;
    let runtime = Axis::Runtime(Arc::clone(time2d.runtime()));
    let canonical = axes.get(&runtime)?.as_runtime()?;
    if Arc::ptr_eq(canonical, time2d.runtime()) {
        return None;
    }

    Some(Axis::from(time2d.with_runtime(Arc::clone(canonical))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        axis::{RuntimeAxis, VertAxis},
        testing::{self, hours},
        value::Level,
    };

    use std::thread;

    fn vert() -> Axis {
        Axis::from(VertAxis::new(100, "Pa", vec![Level::new(500.0), Level::new(850.0)]))
    }

    #[test]
    fn test_intern_returns_canonical() {
        let interner = AxisInterner::new();
        let first = interner.intern(vert());
        let second = interner.intern(vert());
        assert!(first.ptr_eq(&second));
        assert_eq!(interner.len(), 1);

        let other = interner.intern(Axis::from(VertAxis::new(100, "Pa", vec![Level::new(1.0)])));
        assert!(!other.ptr_eq(&first));
        assert_eq!(interner.len(), 2);

        interner.clear();
        assert!(interner.is_empty());
    }

    #[test]
    fn test_seed_replaces() {
        let interner = AxisInterner::new();
        let first = interner.intern(vert());
        let seeded = vert();
        interner.seed(seeded.clone());
        assert!(interner.intern(first).ptr_eq(&seeded));
    }

    #[test]
    fn test_time2d_takes_canonical_runtime() {
        let records = testing::grid(&[0, 6], &[0, 3], &[500.0]);
        let coordsys = testing::coordsys_2d(&records);
        let time2d = coordsys.axes()[1].clone();

        let interner = AxisInterner::new();
        let master = Axis::from(RuntimeAxis::new(
            testing::TIME_CODE,
            testing::unit(),
            vec![hours(0), hours(6)],
        ));
        interner.seed(master.clone());

        let interned = interner.intern(time2d);
        let runtime = interned.as_time2d().unwrap().runtime();
        assert!(Arc::ptr_eq(runtime, master.as_runtime().unwrap()));
    }

    #[test]
    fn test_intern_across_threads() {
        let interner = Arc::new(AxisInterner::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let interner = Arc::clone(&interner);
                thread::spawn(move || interner.intern(vert()))
            })
            .collect();
        let interned: Vec<Axis> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(interner.len(), 1);
        for axis in &interned[1..] {
            assert!(axis.ptr_eq(&interned[0]));
        }
    }
}
