//! Request and response bodies for the JSON API.

pub mod cart;
pub mod chat;

pub use cart::{AddToCart, AddToCartBody, CartLineResponse, MessageResponse, SetQuantityBody};
pub use chat::{ChatRequestBody, ChatResponse, ChatStatus, ChatTurn};
