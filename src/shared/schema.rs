diesel::table! {
    bookings (id) {
        id -> Uuid,
        status -> Varchar,
        payment_status -> Varchar,
        source -> Varchar,
        customer_name -> Nullable<Varchar>,
        customer_email -> Nullable<Varchar>,
        customer_phone -> Nullable<Varchar>,
        address -> Nullable<Varchar>,
        city -> Nullable<Varchar>,
        postcode -> Nullable<Varchar>,
        frequency -> Varchar,
        service_date -> Nullable<Timestamptz>,
        arrival_window -> Varchar,
        subtotal -> Numeric,
        discount -> Numeric,
        total -> Numeric,
        admin_total_override -> Nullable<Numeric>,
        total_time_minutes -> Int4,
        admin_time_override -> Nullable<Int4>,
        discount_code -> Nullable<Varchar>,
        notes -> Nullable<Text>,
        recurrence_id -> Nullable<Uuid>,
        occurrence_index -> Nullable<Int4>,
        stripe_session_id -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    booking_items (id) {
        id -> Uuid,
        booking_id -> Uuid,
        service_id -> Nullable<Uuid>,
        service_name -> Varchar,
        quantity -> Int4,
        unit_price -> Numeric,
        minutes_per_unit -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    recurring_rules (id) {
        id -> Uuid,
        base_booking_id -> Uuid,
        frequency -> Varchar,
        start_at -> Timestamptz,
        active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    services (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
        price -> Numeric,
        duration_minutes -> Int4,
        category -> Nullable<Varchar>,
        sort_order -> Int4,
        is_active -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    discount_codes (id) {
        id -> Uuid,
        code -> Varchar,
        kind -> Varchar,
        value -> Numeric,
        min_order_amount -> Nullable<Numeric>,
        max_discount_amount -> Nullable<Numeric>,
        usage_limit -> Nullable<Int4>,
        times_used -> Int4,
        expires_at -> Nullable<Timestamptz>,
        is_active -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(booking_items -> bookings (booking_id));
diesel::joinable!(recurring_rules -> bookings (base_booking_id));

diesel::allow_tables_to_appear_in_same_query!(
    bookings,
    booking_items,
    recurring_rules,
    services,
    discount_codes,
);
