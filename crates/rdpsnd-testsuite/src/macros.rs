#[macro_export]
macro_rules! encode_decode_test {
    ($test_name:ident : $pdu:expr , $encoded_pdu:expr) => {
        $crate::paste! {
            #[test]
            fn [< $test_name _encode >]() {
                let pdu = $pdu;
                let expected = $encoded_pdu;

                let encoded = ::ironrdp_core::encode_vec(&pdu).unwrap();

                ::assert_hex::assert_eq_hex!(encoded, expected);
            }

            #[test]
            fn [< $test_name _decode >]() {
                let encoded = $encoded_pdu;
                let expected = $pdu;

                let decoded = ::ironrdp_core::decode(&encoded).unwrap();

                let _ = expected == decoded; // type inference trick

                ::assert_hex::assert_eq_hex!(decoded, expected);
            }

            #[test]
            fn [< $test_name _size >]() {
                let pdu = $pdu;
                let expected = $encoded_pdu.len();

                let pdu_size = ::ironrdp_core::Encode::size(&pdu);

                ::assert_hex::assert_eq_hex!(pdu_size, expected);
            }
        }
    };
    ($( $test_name:ident : $pdu:expr , $encoded_pdu:expr ; )+) => {
        $(
            $crate::encode_decode_test!($test_name: $pdu, $encoded_pdu);
        )+
    };
}
