/// Alias for a queue name. Opaque and case-sensitive.
pub type QueueName = String;

/// Alias for a message payload. The broker never looks inside it.
pub type Message = String;
