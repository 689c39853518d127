pub use chat_call_tokio_transport::{
    BrokerConfig, MessageHandler, MessageTransport, SubscriptionId, WebSocketBroker,
};
