use consult_flow::FormData;
use serde_json::{Value, json};

/// System instruction for the one-shot analysis request.
pub const ANALYSIS_SYSTEM_INSTRUCTION: &str = "You are a helpful and empathetic hair transplant \
     consultant from Smile Hair Clinic. Your goal is to provide a preliminary analysis based on \
     user-provided information. Be professional and reassuring. You must output your response in \
     the requested JSON format.";

/// The one error string an analysis failure ever surfaces, whatever went
/// wrong underneath.
pub const ANALYSIS_ERROR_MESSAGE: &str = "Analiz sırasında bir hata oluştu. Lütfen daha sonra \
     tekrar deneyin veya doğrudan kliniğimizle iletişime geçin.";

/// Builds the analysis prompt, embedding every form field.
pub fn analysis_prompt(form: &FormData) -> String {
    let goals = form.goals.join(", ");
    let photo_note = if form.photo.is_some() {
        "Kullanıcı analiz için bir fotoğraf yükledi."
    } else {
        "Kullanıcı fotoğraf yüklemedi."
    };

    format!(
        "Bir saç ekimi danışmanı olarak, aşağıdaki bilgilere dayanarak Smile Hair Clinic adına \
         kısa ve kişisel bir ön analiz yap ve sonucu JSON formatında döndür.\n\
         \n\
         Kullanıcı Bilgileri:\n\
         - Yaş: {}\n\
         - Cinsiyet: {}\n\
         - Saç Dökülme Seviyesi: {}\n\
         - Daha Önce Operasyon Geçirdi mi: {}\n\
         - Hedefleri: {}\n\
         - Fotoğraf Durumu: {}",
        form.age,
        form.gender.as_str(),
        form.hair_loss_level.value(),
        form.previous_operation.as_turkish(),
        goals,
        photo_note,
    )
}

/// Response schema constraining the analysis reply to exactly four strings.
pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "graft": {
                "type": "STRING",
                "description": "Tahmini greft sayısı. Örneğin: '2800-3000 Greft'"
            },
            "recoveryTime": {
                "type": "STRING",
                "description": "Ortalama iyileşme süresi. Örneğin: '10-14 Gün'"
            },
            "suggestedMethod": {
                "type": "STRING",
                "description": "Önerilen saç ekimi tekniği. Örneğin: 'DHI Tekniği'"
            },
            "summary": {
                "type": "STRING",
                "description": "2-3 cümlelik, samimi ve güven verici bir özet metni."
            }
        },
        "required": ["graft", "recoveryTime", "suggestedMethod", "summary"]
    })
}
