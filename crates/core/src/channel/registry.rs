use std::sync::Arc;

use tracing::{debug, warn};

use super::{ChannelAdapter, ChannelType};

/// Registered channel adapters, in registration order.
///
/// Registration order is the deterministic tie-break for channel selection and
/// for choosing a fallback channel. At most one adapter exists per channel type.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn ChannelAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. Registering a channel type twice replaces the
    /// earlier adapter but keeps its position.
    pub fn register(&mut self, adapter: Arc<dyn ChannelAdapter>) {
        let channel = adapter.channel_type();
        match self
            .adapters
            .iter_mut()
            .find(|existing| existing.channel_type() == channel)
        {
            Some(slot) => {
                warn!(channel = %channel, "Replacing already registered channel adapter");
                *slot = adapter;
            }
            None => {
                debug!(channel = %channel, "Channel adapter registered");
                self.adapters.push(adapter);
            }
        }
    }

    pub fn with(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, channel: ChannelType) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.channel_type() == channel)
            .cloned()
    }

    /// Registered channel types in registration order.
    pub fn channel_types(&self) -> Vec<ChannelType> {
        self.adapters.iter().map(|a| a.channel_type()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ChannelAdapter>> {
        self.adapters.iter()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChannelAdapter;

    #[test]
    fn test_registration_order_is_preserved() {
        let registry = AdapterRegistry::new()
            .with(Arc::new(MockChannelAdapter::new(ChannelType::Email)))
            .with(Arc::new(MockChannelAdapter::new(ChannelType::Telegram)))
            .with(Arc::new(MockChannelAdapter::new(ChannelType::Sms)));

        assert_eq!(
            registry.channel_types(),
            vec![ChannelType::Email, ChannelType::Telegram, ChannelType::Sms]
        );
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_duplicate_registration_replaces_in_place() {
        let replacement = Arc::new(MockChannelAdapter::new(ChannelType::Email));
        let registry = AdapterRegistry::new()
            .with(Arc::new(MockChannelAdapter::new(ChannelType::Email)))
            .with(Arc::new(MockChannelAdapter::new(ChannelType::Telegram)))
            .with(replacement.clone());

        assert_eq!(
            registry.channel_types(),
            vec![ChannelType::Email, ChannelType::Telegram]
        );
        let found = registry.get(ChannelType::Email).unwrap();
        let replacement: Arc<dyn ChannelAdapter> = replacement;
        assert!(Arc::ptr_eq(&found, &replacement));
    }

    #[test]
    fn test_get_unregistered_channel() {
        let registry = AdapterRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(ChannelType::Push).is_none());
    }
}
