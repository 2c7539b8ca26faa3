diesel::table! {
    orders (id) {
        id -> Uuid,
        customer_id -> Uuid,
        restaurant_id -> Uuid,
        delivery_person_id -> Nullable<Uuid>,
        items -> Jsonb,
        delivery_address -> Jsonb,
        payment_method -> Varchar,
        special_instructions -> Nullable<Text>,
        subtotal -> Numeric,
        delivery_fee -> Numeric,
        tax -> Numeric,
        discount -> Numeric,
        total_amount -> Numeric,
        status -> Varchar,
        batch_number -> Varchar,
        order_timeline -> Jsonb,
        batch_tracking -> Jsonb,
        ratings -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    restaurants (id) {
        id -> Uuid,
        owner_id -> Uuid,
        name -> Varchar,
        address -> Nullable<Text>,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    reviews (id) {
        id -> Uuid,
        customer_id -> Uuid,
        order_id -> Uuid,
        restaurant_id -> Uuid,
        delivery_person_id -> Nullable<Uuid>,
        order_amount -> Numeric,
        batch_number -> Varchar,
        restaurant_rating -> Nullable<Int2>,
        restaurant_comment -> Nullable<Text>,
        restaurant_rated_at -> Nullable<Timestamptz>,
        delivery_rating -> Nullable<Int2>,
        delivery_comment -> Nullable<Text>,
        delivery_rated_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(orders -> restaurants (restaurant_id));
diesel::joinable!(reviews -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(
    orders,
    restaurants,
    reviews,
);
