// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module provides a pool of reusable scratch objects. Each worker
//! checks an object out for the duration of one unit of work and returns it
//! afterwards, so that the (possibly large) scratch buffers are allocated
//! once per worker rather than once per node.

use parking_lot::Mutex;

pub struct ObjectPool<'a, T> {
    items: Mutex<Vec<T>>,
    factory: Box<dyn Fn() -> T + Send + Sync + 'a>,
}
impl <'a, T> ObjectPool<'a, T> {
    pub fn new<F>(factory: F) -> Self
        where F: Fn() -> T + Send + Sync + 'a
    {
        Self { items: Mutex::new(vec![]), factory: Box::new(factory) }
    }
    /// Makes sure at least `n` objects are idle in the pool
    pub fn allocate(&self, n: usize) {
        let mut items = self.items.lock();
        while items.len() < n {
            items.push((self.factory)());
        }
    }
    /// Checks an object out, runs `f` with it and checks it back in (even
    /// when `f` panics). A fresh object is created when none is idle.
    pub fn with<R, F>(&self, f: F) -> R
        where F: FnOnce(&mut T) -> R
    {
        let mut lease = Lease { pool: self, item: self.items.lock().pop() };
        let item = lease.item.get_or_insert_with(|| (self.factory)());
        f(item)
    }
}

/// An object checked out of a pool. It goes back to the pool when dropped.
struct Lease<'p, 'a, T> {
    pool: &'p ObjectPool<'a, T>,
    item: Option<T>,
}
impl <T> Drop for Lease<'_, '_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.items.lock().push(item);
        }
    }
}

#[cfg(test)]
mod test_object_pool {
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::ObjectPool;

    #[test]
    fn objects_are_reused() {
        let created = AtomicUsize::new(0);
        let pool = ObjectPool::new(|| { created.fetch_add(1, Ordering::Relaxed); Vec::<usize>::new() });
        pool.with(|v| v.push(1));
        pool.with(|v| v.push(2));
        assert_eq!(1, created.load(Ordering::Relaxed));
        assert_eq!(vec![1, 2], pool.with(|v| v.clone()));
    }
    #[test]
    fn allocate_prefills_the_pool() {
        let created = AtomicUsize::new(0);
        let pool = ObjectPool::new(|| created.fetch_add(1, Ordering::Relaxed));
        pool.allocate(3);
        assert_eq!(3, created.load(Ordering::Relaxed));
        pool.allocate(2);
        pool.with(|_| ());
        assert_eq!(3, created.load(Ordering::Relaxed));
    }
    #[test]
    fn an_empty_pool_creates_objects_on_demand() {
        let created = AtomicUsize::new(0);
        let pool = ObjectPool::new(|| created.fetch_add(1, Ordering::Relaxed));
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| pool.with(|_| std::thread::sleep(std::time::Duration::from_millis(10))));
            }
        });
        let total = created.load(Ordering::Relaxed);
        assert!((1..=4).contains(&total));
        // every object went back to the pool
        pool.allocate(total);
        assert_eq!(total, created.load(Ordering::Relaxed));
    }
    #[test]
    fn an_object_goes_back_to_the_pool_when_the_work_panics() {
        let created = AtomicUsize::new(0);
        let pool = ObjectPool::new(|| { created.fetch_add(1, Ordering::Relaxed); Vec::<usize>::new() });
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pool.with(|v| {
                v.push(1);
                panic!("boom");
            })
        }));
        assert!(outcome.is_err());
        assert_eq!(vec![1], pool.with(|v| v.clone()));
        assert_eq!(1, created.load(Ordering::Relaxed));
    }
}
