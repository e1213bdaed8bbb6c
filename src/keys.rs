use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin pool of API keys shared by every outbound call.
#[derive(Debug)]
pub struct KeyRotator {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyRotator {
    pub fn new(keys: Vec<String>) -> anyhow::Result<Self> {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            anyhow::bail!("API key pool is empty; set API_KEYS to a comma-separated list");
        }
        Ok(Self {
            keys,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn next(&self) -> &str {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        &self.keys[i]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotates_in_order_and_wraps() {
        let r = KeyRotator::new(vec!["a".into(), "b".into(), "c".into()]).unwrap();
        let got: Vec<&str> = (0..7).map(|_| r.next()).collect();
        assert_eq!(got, vec!["a", "b", "c", "a", "b", "c", "a"]);
    }

    #[test]
    fn test_blank_entries_are_dropped() {
        let r = KeyRotator::new(vec![" k1 ".into(), "".into(), "  ".into()]).unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r.next(), "k1");
        assert_eq!(r.next(), "k1");
    }

    #[test]
    fn test_empty_pool_is_a_config_error() {
        assert!(KeyRotator::new(vec![]).is_err());
        assert!(KeyRotator::new(vec![" ".into()]).is_err());
    }

    #[test]
    fn test_concurrent_draws_stay_balanced() {
        let r = std::sync::Arc::new(KeyRotator::new(vec!["a".into(), "b".into()]).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let r = r.clone();
                std::thread::spawn(move || (0..250).filter(|_| r.next() == "a").count())
            })
            .collect();
        let a_count: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(a_count, 500);
    }
}
