mod test_candidate_failure_closes;
mod test_data_relay;
mod test_offer_answer_cycle;
