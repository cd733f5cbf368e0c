pub mod area;
pub mod category;
pub mod combo;
pub mod combo_item;
pub mod dining_table;
pub mod dish;
pub mod invoice;
pub mod order;
pub mod order_item;
pub mod payment_method;
pub mod payment_record;
pub mod promo_usage;
pub mod promotion;
pub mod reservation;
pub mod staff;
pub mod table_group;
pub mod table_group_member;
