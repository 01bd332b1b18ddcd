pub mod cart_items;
pub mod carts;
pub mod categories;
pub mod order_items;
pub mod orders;
pub mod product_images;
pub mod product_questions;
pub mod products;
pub mod reviews;
pub mod sea_orm_active_enums;
pub mod sessions;
pub mod users;

pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use categories::Entity as Categories;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_images::Entity as ProductImages;
pub use product_questions::Entity as ProductQuestions;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use sessions::Entity as Sessions;
pub use users::Entity as Users;
