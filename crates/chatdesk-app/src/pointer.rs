// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

impl Point {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Screen rectangle of a mounted element, in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Bounds {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn left(self) -> u16 {
        self.x
    }

    pub const fn top(self) -> u16 {
        self.y
    }

    pub const fn right(self) -> u16 {
        self.x.saturating_add(self.width)
    }

    /// One past the last row, matching a DOM rect's `bottom`.
    pub const fn bottom(self) -> u16 {
        self.y.saturating_add(self.height)
    }

    pub const fn contains(self, point: Point) -> bool {
        point.x >= self.left()
            && point.x < self.right()
            && point.y >= self.top()
            && point.y < self.bottom()
    }
}

type Listener = Rc<dyn Fn(Point)>;

#[derive(Default)]
struct HubState {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Document-wide pointer-down fan-out.
///
/// Listeners stay registered for as long as their [`ListenerGuard`] lives.
#[derive(Clone, Default)]
pub struct PointerHub {
    state: Rc<RefCell<HubState>>,
}

impl fmt::Debug for PointerHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl PointerHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen<F>(&self, handler: F) -> ListenerGuard
    where
        F: Fn(Point) + 'static,
    {
        let mut state = self.state.borrow_mut();
        state.next_id = state.next_id.saturating_add(1);
        let id = state.next_id;
        state.listeners.push((id, Rc::new(handler)));
        ListenerGuard {
            hub: Rc::downgrade(&self.state),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Delivers a pointer-down to every registered listener in registration
    /// order. Listeners may register or drop guards while being notified.
    pub fn pointer_down(&self, point: Point) {
        let listeners = self
            .state
            .borrow()
            .listeners
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect::<Vec<_>>();
        for listener in listeners {
            listener(point);
        }
    }
}

/// Deregisters its listener when dropped.
#[must_use = "dropping the guard removes the listener immediately"]
pub struct ListenerGuard {
    hub: Weak<RefCell<HubState>>,
    id: u64,
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard").field("id", &self.id).finish()
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        let Some(state) = self.hub.upgrade() else {
            return;
        };
        // The listener is dropped after the borrow ends; its captures may own guards too.
        let removed = {
            let mut state = state.borrow_mut();
            state
                .listeners
                .iter()
                .position(|(id, _)| *id == self.id)
                .map(|index| state.listeners.remove(index))
        };
        drop(removed);
    }
}
