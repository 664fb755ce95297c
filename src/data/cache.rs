/// Key/value store for raw text-generation responses.
///
/// Keys are hex digests of the outbound prompt, so equal placeholder sets map to
/// the same entry. Implementations never fail loudly: a read problem is a miss and
/// a write problem is logged and dropped.
pub trait Cache {
    /// Returns the stored response for `key`, or `None` on a miss or read failure.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: &str);
}
