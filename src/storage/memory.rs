//! 测试用内存存储

use super::Storage;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// 记录调用顺序，可指定失败的 key，并统计最大并发数
#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub calls: Mutex<Vec<String>>,
    pub failing: Mutex<HashSet<String>>,
    pub in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl MemoryStorage {
    pub fn fail_on(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    async fn track<T>(&self, call: String, f: impl Future<Output = T>) -> T {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        let result = f.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn check(&self, key: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(key) {
            anyhow::bail!("injected failure");
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn write(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.track(format!("put {}", key), async {
            self.check(key)?;
            self.objects.lock().unwrap().insert(key.to_string(), data);
            Ok::<(), anyhow::Error>(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.track(format!("delete {}", key), async {
            self.check(key)?;
            self.objects.lock().unwrap().remove(key);
            Ok::<(), anyhow::Error>(())
        })
        .await
    }

    fn name(&self) -> &str {
        "memory"
    }
}
