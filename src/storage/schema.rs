// Key naming conventions and prefix constants
pub mod keys {
    /// Chain head key prefix: "{symbol}:chain_head"
    pub const CHAIN_HEAD_PREFIX: &str = "chain_head";

    /// Local block header key prefix: "{symbol}:block_header:{height}"
    pub const BLOCK_HEADER_PREFIX: &str = "block_header";

    /// Retry marker key prefix: "{symbol}:unscan:{height}:{record_id}"
    pub const UNSCAN_PREFIX: &str = "unscan";

    // example: NEAR:chain_head
    pub fn chain_head_key(symbol: &str) -> String {
        format!("{}:{}", symbol, CHAIN_HEAD_PREFIX)
    }

    // example: NEAR:block_header:103599000
    pub fn block_header_key(symbol: &str, height: u64) -> String {
        format!("{}:{}:{}", symbol, BLOCK_HEADER_PREFIX, height)
    }

    // example: NEAR:unscan:103599000:cf23df2207d99a74fbe169e3eba035e633b65d94
    pub fn unscan_key(symbol: &str, height: u64, record_id: &str) -> String {
        format!("{}:{}:{}:{}", symbol, UNSCAN_PREFIX, height, record_id)
    }

    /// Prefix covering every retry marker at one height. The trailing
    /// colon keeps height 10 from matching 100, 1000, ...
    pub fn unscan_height_prefix(symbol: &str, height: u64) -> String {
        format!("{}:{}:{}:", symbol, UNSCAN_PREFIX, height)
    }

    /// Prefix covering every retry marker for a symbol.
    pub fn unscan_prefix(symbol: &str) -> String {
        format!("{}:{}:", symbol, UNSCAN_PREFIX)
    }
}

// Data version management
pub const SCHEMA_VERSION: u32 = 1;
