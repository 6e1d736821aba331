mod keyring_store;
mod token_store;

pub use keyring_store::KeyringTokenStore;
pub use token_store::{
    FileTokenStore, MemoryTokenStore, StoreError, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
