//! 观察者注册表
//!
//! 替代"回调数组 + 手动移除"的模式：`subscribe()` 返回一个 [`Subscription`]，
//! 按 id（身份）退订；多个订阅者互相独立地收到同一事件。
//!
//! # 顺序
//!
//! 对**同一个**订阅者，事件按 `emit()` 调用顺序送达（FIFO）。
//! 不同订阅者之间没有相对顺序保证。
//!
//! # 重入
//!
//! `emit()` 先复制监听者快照再释放锁，所以回调内部可以安全地订阅/退订。
//!
//! ```rust
//! use edubot_hal::observer::ListenerRegistry;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let registry = ListenerRegistry::<u32>::new();
//! let hits = Arc::new(AtomicUsize::new(0));
//! let counter = hits.clone();
//! let sub = registry.subscribe(move |_| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! registry.emit(&1);
//! sub.unsubscribe();
//! registry.emit(&2);
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T: ?Sized> {
    next_id: u64,
    listeners: Vec<(u64, Callback<T>)>,
}

/// 监听者注册表
pub struct ListenerRegistry<T: ?Sized> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: ?Sized + 'static> ListenerRegistry<T> {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// 注册监听者
    ///
    /// 返回的 [`Subscription`] 被 drop 时自动退订；需要永久监听时调用 `detach()`。
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<Mutex<Inner<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            id,
            unsubscribe: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.lock().listeners.retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    /// 向所有监听者广播
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in snapshot {
            callback(value);
        }
    }

    /// 当前监听者数量
    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// 是否没有监听者
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 移除所有监听者
    pub fn clear(&self) {
        self.inner.lock().listeners.clear();
    }
}

impl<T: ?Sized + 'static> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for ListenerRegistry<T> {
    /// 克隆得到的是同一个注册表的另一个句柄
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// 订阅句柄（disposer）
///
/// drop 时退订。
#[must_use = "dropping a Subscription unsubscribes immediately; call detach() to keep listening"]
pub struct Subscription {
    id: u64,
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// 订阅 id（在所属注册表内唯一）
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 显式退订
    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }

    /// 放弃句柄但保持订阅，直到注册表本身被释放
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fan_out_to_all_subscribers() {
        let registry = ListenerRegistry::<u32>::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));

        let a2 = a.clone();
        let _sa = registry.subscribe(move |v| {
            a2.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let b2 = b.clone();
        let _sb = registry.subscribe(move |v| {
            b2.fetch_add(*v as usize, Ordering::SeqCst);
        });

        registry.emit(&3);
        assert_eq!(a.load(Ordering::SeqCst), 3);
        assert_eq!(b.load(Ordering::SeqCst), 3);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unsubscribe_by_identity() {
        let registry = ListenerRegistry::<u32>::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));

        let a2 = a.clone();
        let sa = registry.subscribe(move |_| {
            a2.fetch_add(1, Ordering::SeqCst);
        });
        let b2 = b.clone();
        let _sb = registry.subscribe(move |_| {
            b2.fetch_add(1, Ordering::SeqCst);
        });

        sa.unsubscribe();
        registry.emit(&0);
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes_and_detach_keeps() {
        let registry = ListenerRegistry::<str>::new();
        {
            let _sub = registry.subscribe(|_| {});
            assert_eq!(registry.len(), 1);
        }
        assert!(registry.is_empty());

        registry.subscribe(|_| {}).detach();
        assert_eq!(registry.len(), 1);
        registry.emit("hello");
    }

    #[test]
    fn test_fifo_per_subscriber() {
        let registry = ListenerRegistry::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let _sub = registry.subscribe(move |v| seen2.lock().push(*v));

        for i in 0..10 {
            registry.emit(&i);
        }
        assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_reentrant_unsubscribe_inside_callback() {
        let registry = ListenerRegistry::<u32>::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot2 = slot.clone();
        let sub = registry.subscribe(move |_| {
            slot2.lock().take();
        });
        *slot.lock() = Some(sub);

        registry.emit(&1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_subscription_outlives_registry() {
        let registry = ListenerRegistry::<u32>::new();
        let sub = registry.subscribe(|_| {});
        drop(registry);
        sub.unsubscribe();
    }
}
